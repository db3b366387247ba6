//! Stage board controller.
//!
//! Owns the per-stage view state and the shared filter / page size, and drives
//! every load against the record store:
//! - Each load copies the filter and page size into a `QuerySnapshot` tagged
//!   with the current epoch. Filter and page-size changes bump the epoch, and
//!   responses from an older epoch are dropped.
//! - Each request takes a ticket. Only the newest row request for a stage may
//!   replace its rows (last request wins); counts never go back to an older ticket.
//! - All store calls pass through one semaphore, so a full refresh never has
//!   more than `max_concurrent_requests` requests in flight.
//! - No lock is held across an await.
pub mod events;
pub mod transition;


use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, Semaphore};

use crate::collaborators::{ContactInitiator, DocumentViewer};
use crate::config::{BoardConfig, ConfigError};
use crate::filter::{CategoryFilter, FilterEngine, QuerySpec};
use crate::pagination;
use crate::stages::{StageId, StageRegistry};
use crate::storage::{PageResult, RecordStore, StoreError};
use crate::types::{SortSpec, StageSummary, StageViewState};

pub use events::BoardEvent;
pub use transition::{TransitionOutcome, TransitionPhase};

const LOG_LOAD: &str = "crewboard.board.load";

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Invalid board config: {0}")]
    Config(#[from] ConfigError),

    #[error("Page size {requested} is not one of {allowed:?}")]
    InvalidPageSize { requested: usize, allowed: Vec<usize> },

    #[error("A stage transition is already being persisted")]
    TransitionInProgress,

    #[error("No drag in progress")]
    NotDragging,

    #[error("Record {record_id} is not visible in stage {stage}")]
    RecordNotVisible { record_id: String, stage: StageId },

    #[error("Record {0} has no phone or email")]
    MissingContact(String),

    #[error("No {0} configured")]
    CollaboratorMissing(&'static str),
}

/// Result of one count or page load. Loads never fail the caller; a failed
/// store call is reported here and on the stage's error indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request or filter epoch superseded this one; nothing changed.
    Stale,
    Failed(StoreError),
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied)
    }
}

/// Filter and page size captured when a request is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub epoch: u64,
    pub page_size: usize,
    pub spec: QuerySpec,
}

/// Serializable copy of the whole board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub filter: FilterEngine,
    pub epoch: u64,
    pub stages: Vec<StageSummary>,
}

pub(crate) struct BoardState {
    pub(crate) registry: StageRegistry,
    pub(crate) filter: FilterEngine,
    pub(crate) page_size: usize,
    pub(crate) epoch: u64,
    next_ticket: u64,
    pub(crate) transition: TransitionPhase,
}

impl BoardState {
    fn snapshot(&self, stage: StageId) -> QuerySnapshot {
        QuerySnapshot {
            epoch: self.epoch,
            page_size: self.page_size,
            spec: self.filter.build_predicate(stage),
        }
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

pub struct BoardController {
    store: Arc<dyn RecordStore>,
    config: BoardConfig,
    state: Mutex<BoardState>,
    limiter: Semaphore,
    event_tx: broadcast::Sender<BoardEvent>,
    document_viewer: Option<Arc<dyn DocumentViewer>>,
    contact_initiator: Option<Arc<dyn ContactInitiator>>,
}

impl BoardController {
    pub fn new(store: Arc<dyn RecordStore>, config: BoardConfig) -> Result<Self, BoardError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        Ok(Self {
            store,
            state: Mutex::new(BoardState {
                registry: StageRegistry::new(),
                filter: FilterEngine::new(),
                page_size: config.default_page_size,
                epoch: 0,
                next_ticket: 0,
                transition: TransitionPhase::Idle,
            }),
            limiter: Semaphore::new(config.max_concurrent_requests),
            event_tx,
            document_viewer: None,
            contact_initiator: None,
            config,
        })
    }

    pub fn with_document_viewer(mut self, viewer: Arc<dyn DocumentViewer>) -> Self {
        self.document_viewer = Some(viewer);
        self
    }

    pub fn with_contact_initiator(mut self, initiator: Arc<dyn ContactInitiator>) -> Self {
        self.contact_initiator = Some(initiator);
        self
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Run a store request under the concurrency limit and optional timeout.
    pub(crate) async fn limited<T>(
        &self,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("request limiter closed".into()))?;
        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| StoreError::Timeout(limit.as_millis() as u64))?,
            None => request.await,
        }
    }

    // ── Read accessors ────────────────────────────────────────────────

    pub fn page_size(&self) -> usize {
        self.lock().page_size
    }

    pub fn filter(&self) -> FilterEngine {
        self.lock().filter.clone()
    }

    pub fn stage_view(&self, stage: StageId) -> StageViewState {
        self.lock().registry.view(stage).clone()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.lock();
        BoardSnapshot {
            page_size: state.page_size,
            page_size_options: self.config.page_size_options.clone(),
            filter: state.filter.clone(),
            epoch: state.epoch,
            stages: state.registry.summaries(),
        }
    }

    // ── Loads ─────────────────────────────────────────────────────────

    /// Initial full load.
    pub async fn mount(&self) -> Vec<(StageId, LoadOutcome)> {
        log::info!(target: LOG_LOAD, "Mounting board with {} stages", StageId::ALL.len());
        self.refresh_all().await
    }

    /// Count-only refresh of one stage.
    pub async fn load_count(&self, stage: StageId) -> LoadOutcome {
        let (snapshot, ticket) = {
            let mut state = self.lock();
            (state.snapshot(stage), state.issue_ticket())
        };

        let result = self.limited(self.store.count(&snapshot.spec)).await;

        let mut state = self.lock();
        if state.epoch != snapshot.epoch {
            log::debug!(target: LOG_LOAD, "Dropping count for {} from epoch {}", stage, snapshot.epoch);
            return LoadOutcome::Stale;
        }
        let slot = state.registry.slot_mut(stage);
        match result {
            Ok(total_count) => {
                if ticket <= slot.applied_count_ticket {
                    return LoadOutcome::Stale;
                }
                slot.apply_total(total_count, snapshot.page_size);
                slot.applied_count_ticket = ticket;
                slot.view.error = None;
                let event = BoardEvent::StageLoaded {
                    stage,
                    total_count,
                    current_page: slot.view.current_page,
                    total_pages: slot.view.total_pages,
                };
                drop(state);
                self.emit(event);
                LoadOutcome::Applied
            }
            Err(e) => {
                slot.view.error = Some(e.to_string());
                drop(state);
                self.report_failure(stage, "count", e)
            }
        }
    }

    /// Load one page of a stage. The page is clamped into range, and rows and
    /// total come back together from a single store query.
    pub async fn load_page(&self, stage: StageId, page: usize) -> LoadOutcome {
        let (snapshot, ticket, page) = {
            let mut state = self.lock();
            let snapshot = state.snapshot(stage);
            let ticket = state.issue_ticket();
            let slot = state.registry.slot_mut(stage);
            let page = pagination::clamp_page(page, slot.view.total_pages);
            slot.latest_rows_ticket = ticket;
            slot.view.is_loading = true;
            (snapshot, ticket, page)
        };
        self.fetch_page(stage, snapshot, ticket, page).await
    }

    async fn fetch_page(
        &self,
        stage: StageId,
        snapshot: QuerySnapshot,
        ticket: u64,
        mut page: usize,
    ) -> LoadOutcome {
        let mut reclamped = false;
        loop {
            let window = pagination::window_for(page, snapshot.page_size);
            let result = self
                .limited(self.store.page_with_count(&snapshot.spec, window, SortSpec::NewestFirst))
                .await;

            let mut state = self.lock();
            let current_epoch = state.epoch;
            let slot = state.registry.slot_mut(stage);
            if slot.latest_rows_ticket != ticket || current_epoch != snapshot.epoch {
                log::debug!(
                    target: LOG_LOAD,
                    "Dropping superseded page {} of {} (ticket {}, epoch {})",
                    page,
                    stage,
                    ticket,
                    snapshot.epoch
                );
                return LoadOutcome::Stale;
            }

            match result {
                Ok(PageResult { rows, total_count }) => {
                    let total_pages = pagination::compute_total_pages(total_count, snapshot.page_size);
                    if page > total_pages && !reclamped {
                        // The stage shrank since the page was chosen; fetch the last real page.
                        page = total_pages;
                        reclamped = true;
                        continue;
                    }
                    if ticket > slot.applied_count_ticket {
                        slot.apply_total(total_count, snapshot.page_size);
                        slot.applied_count_ticket = ticket;
                    }
                    slot.apply_rows(rows, page);
                    slot.view.is_loading = false;
                    slot.view.error = None;
                    let event = BoardEvent::StageLoaded {
                        stage,
                        total_count: slot.view.total_count,
                        current_page: slot.view.current_page,
                        total_pages: slot.view.total_pages,
                    };
                    drop(state);
                    self.emit(event);
                    return LoadOutcome::Applied;
                }
                Err(e) => {
                    slot.view.is_loading = false;
                    slot.view.error = Some(e.to_string());
                    drop(state);
                    return self.report_failure(stage, "page", e);
                }
            }
        }
    }

    fn report_failure(&self, stage: StageId, what: &str, error: StoreError) -> LoadOutcome {
        log::warn!(target: LOG_LOAD, "Failed to load {} for stage {}: {}", what, stage, error);
        self.emit(BoardEvent::StageLoadFailed {
            stage,
            message: error.to_string(),
        });
        LoadOutcome::Failed(error)
    }

    /// Count and first page of one stage.
    pub async fn refresh_stage(&self, stage: StageId) -> LoadOutcome {
        self.load_page(stage, 1).await
    }

    /// Reload count and first page of every stage. Stages load independently;
    /// a slow or failing stage does not hold back the others.
    pub async fn refresh_all(&self) -> Vec<(StageId, LoadOutcome)> {
        let loads = StageId::ALL
            .iter()
            .map(|&stage| async move { (stage, self.refresh_stage(stage).await) });
        let outcomes = join_all(loads).await;

        let failed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, LoadOutcome::Failed(_)))
            .count();
        if failed > 0 {
            log::warn!(target: LOG_LOAD, "Refresh finished with {} failed stage(s)", failed);
        }
        outcomes
    }

    // ── Navigation ────────────────────────────────────────────────────

    pub async fn next_page(&self, stage: StageId) -> LoadOutcome {
        let target = {
            let state = self.lock();
            let view = state.registry.view(stage);
            pagination::next_page(view.current_page, view.total_pages)
        };
        self.load_page(stage, target).await
    }

    pub async fn prev_page(&self, stage: StageId) -> LoadOutcome {
        let target = {
            let state = self.lock();
            let view = state.registry.view(stage);
            pagination::prev_page(view.current_page, view.total_pages)
        };
        self.load_page(stage, target).await
    }

    // ── Filter and page size ──────────────────────────────────────────

    /// Change the shared page size. Every stage goes back to page 1 and reloads.
    pub async fn on_page_size_change(
        &self,
        page_size: usize,
    ) -> Result<Vec<(StageId, LoadOutcome)>, BoardError> {
        if !self.config.allows_page_size(page_size) {
            return Err(BoardError::InvalidPageSize {
                requested: page_size,
                allowed: self.config.page_size_options.clone(),
            });
        }
        {
            let mut state = self.lock();
            state.page_size = page_size;
            state.epoch += 1;
            state.registry.reset_pages(page_size);
        }
        log::debug!(target: LOG_LOAD, "Page size changed to {}", page_size);
        self.emit(BoardEvent::PageSizeChanged { page_size });
        Ok(self.refresh_all().await)
    }

    /// Set the search term and, if it changed, reload every stage under it.
    pub async fn set_search_term(&self, term: impl Into<String>) -> Vec<(StageId, LoadOutcome)> {
        let changed = self.lock().filter.set_search_term(term);
        self.after_filter_change(changed).await
    }

    /// Set the category filter and, if it changed, reload every stage under it.
    pub async fn set_category_filter(&self, filter: CategoryFilter) -> Vec<(StageId, LoadOutcome)> {
        let changed = self.lock().filter.set_category_filter(filter);
        self.after_filter_change(changed).await
    }

    async fn after_filter_change(&self, changed: bool) -> Vec<(StageId, LoadOutcome)> {
        if !changed {
            return Vec::new();
        }
        let event = {
            let mut state = self.lock();
            state.epoch += 1;
            BoardEvent::FilterChanged {
                search_term: state.filter.search_term().to_string(),
                category_filter: state.filter.category_filter(),
            }
        };
        self.emit(event);
        self.refresh_all().await
    }

    // ── Row actions ───────────────────────────────────────────────────

    /// Hand a record to the document viewer.
    pub fn open_document(&self, record_id: &str) -> Result<(), BoardError> {
        let viewer = self
            .document_viewer
            .as_ref()
            .ok_or(BoardError::CollaboratorMissing("document viewer"))?;
        viewer.open(record_id);
        Ok(())
    }

    /// Start a conversation with a record visible in `stage`.
    pub fn contact_record(&self, stage: StageId, record_id: &str) -> Result<(), BoardError> {
        let initiator = self
            .contact_initiator
            .as_ref()
            .ok_or(BoardError::CollaboratorMissing("contact initiator"))?;
        let handle = {
            let state = self.lock();
            let record = state
                .registry
                .view(stage)
                .rows
                .iter()
                .find(|r| r.id == record_id)
                .ok_or_else(|| BoardError::RecordNotVisible {
                    record_id: record_id.to_string(),
                    stage,
                })?;
            record
                .contact_handle()
                .map(str::to_string)
                .ok_or_else(|| BoardError::MissingContact(record_id.to_string()))?
        };
        initiator.start_conversation(&handle);
        Ok(())
    }
}
