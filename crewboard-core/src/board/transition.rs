/// Drag-and-drop stage transitions.
///
/// A move runs Idle -> Dragging -> (drop) -> Persisting -> Committed | Failed -> Idle.
/// On drop the record leaves the source stage's rows at once and the source
/// total drops by one. The stage change is then persisted:
/// - on success both source and target reload count and first page, which
///   reconciles the local decrement and shows the record in its new stage;
/// - on failure the record goes back to its old position in the source rows
///   and the total is restored, unless the source stage has been reloaded
///   from the store in the meantime.
/// Dropping on the source stage does nothing.
use futures_util::future::join;
use serde::Serialize;

use super::{BoardController, BoardError, BoardEvent, BoardState, LoadOutcome};
use crate::stages::StageId;
use crate::storage::StoreError;
use crate::types::Record;

const LOG_TRANSITION: &str = "crewboard.board.transition";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TransitionPhase {
    #[default]
    Idle,
    Dragging {
        record_id: String,
        source: StageId,
    },
    Persisting {
        record_id: String,
        source: StageId,
        target: StageId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Dropped on the stage it came from.
    NoOp,
    Committed {
        record_id: String,
        source: StageId,
        target: StageId,
        source_reload: LoadOutcome,
        target_reload: LoadOutcome,
    },
    Failed {
        record_id: String,
        source: StageId,
        target: StageId,
        error: StoreError,
        restored: bool,
    },
}

/// What the optimistic removal took out of the source stage.
struct Removal {
    record: Record,
    index: usize,
    rows_generation: u64,
    count_ticket: u64,
}

impl BoardState {
    fn remove_optimistically(&mut self, source: StageId, record_id: &str) -> Option<Removal> {
        let page_size = self.page_size;
        let slot = self.registry.slot_mut(source);
        let index = slot.view.rows.iter().position(|r| r.id == record_id)?;
        let record = slot.view.rows.remove(index);
        let total = slot.view.total_count.saturating_sub(1);
        slot.apply_total(total, page_size);
        Some(Removal {
            record,
            index,
            rows_generation: slot.rows_generation,
            count_ticket: slot.applied_count_ticket,
        })
    }

    /// Undo an optimistic removal. Returns whether the row was put back.
    ///
    /// The total is only raised again when no count has landed since the
    /// removal; a newer count already includes the record.
    fn restore(&mut self, source: StageId, removal: Removal) -> bool {
        let page_size = self.page_size;
        let slot = self.registry.slot_mut(source);
        if slot.rows_generation != removal.rows_generation {
            // Rows were reloaded from the store; they already reflect the failed move.
            return false;
        }
        if slot.view.rows.iter().any(|r| r.id == removal.record.id) {
            return false;
        }
        let index = removal.index.min(slot.view.rows.len());
        slot.view.rows.insert(index, removal.record);
        slot.view.rows.truncate(page_size);
        if slot.applied_count_ticket == removal.count_ticket {
            let total = slot.view.total_count + 1;
            slot.apply_total(total, page_size);
        }
        true
    }
}

impl BoardController {
    pub fn transition_phase(&self) -> TransitionPhase {
        self.lock().transition.clone()
    }

    /// Start dragging a record out of `source`. Replaces any drag not yet dropped.
    pub fn begin_drag(&self, record_id: impl Into<String>, source: StageId) -> Result<(), BoardError> {
        let mut state = self.lock();
        if matches!(state.transition, TransitionPhase::Persisting { .. }) {
            return Err(BoardError::TransitionInProgress);
        }
        state.transition = TransitionPhase::Dragging {
            record_id: record_id.into(),
            source,
        };
        Ok(())
    }

    /// Abandon a drag without dropping. Returns false when nothing was being dragged.
    pub fn cancel_drag(&self) -> bool {
        let mut state = self.lock();
        if matches!(state.transition, TransitionPhase::Dragging { .. }) {
            state.transition = TransitionPhase::Idle;
            true
        } else {
            false
        }
    }

    /// Drop the dragged record on `target`.
    pub async fn drop_on(&self, target: StageId) -> Result<TransitionOutcome, BoardError> {
        let (record_id, source, removal) = {
            let mut state = self.lock();
            let (record_id, source) = match &state.transition {
                TransitionPhase::Idle => return Err(BoardError::NotDragging),
                TransitionPhase::Persisting { .. } => return Err(BoardError::TransitionInProgress),
                TransitionPhase::Dragging { record_id, source } => (record_id.clone(), *source),
            };
            if source == target {
                state.transition = TransitionPhase::Idle;
                log::debug!(target: LOG_TRANSITION, "Record {} dropped on its own stage {}", record_id, source);
                return Ok(TransitionOutcome::NoOp);
            }
            let removal = state.remove_optimistically(source, &record_id);
            if removal.is_none() {
                log::debug!(
                    target: LOG_TRANSITION,
                    "Record {} not visible in {}; persisting without local removal",
                    record_id,
                    source
                );
            }
            state.transition = TransitionPhase::Persisting {
                record_id: record_id.clone(),
                source,
                target,
            };
            (record_id, source, removal)
        };

        let result = self.limited(self.store.update_stage(&record_id, target)).await;

        match result {
            Ok(()) => {
                let (source_reload, target_reload) =
                    join(self.refresh_stage(source), self.refresh_stage(target)).await;
                self.lock().transition = TransitionPhase::Idle;
                log::info!(target: LOG_TRANSITION, "Record {} moved {} -> {}", record_id, source, target);
                self.emit(BoardEvent::TransitionCommitted {
                    record_id: record_id.clone(),
                    source,
                    target,
                });
                Ok(TransitionOutcome::Committed {
                    record_id,
                    source,
                    target,
                    source_reload,
                    target_reload,
                })
            }
            Err(error) => {
                let restored = {
                    let mut state = self.lock();
                    let restored = match removal {
                        Some(removal) => state.restore(source, removal),
                        None => false,
                    };
                    state.registry.slot_mut(source).view.error =
                        Some(format!("Failed to move {} to {}: {}", record_id, target, error));
                    state.transition = TransitionPhase::Idle;
                    restored
                };
                log::error!(
                    target: LOG_TRANSITION,
                    "Failed to move record {} {} -> {}: {} (restored: {})",
                    record_id,
                    source,
                    target,
                    error,
                    restored
                );
                self.emit(BoardEvent::TransitionFailed {
                    record_id: record_id.clone(),
                    source,
                    target,
                    message: error.to_string(),
                    restored,
                });
                Ok(TransitionOutcome::Failed {
                    record_id,
                    source,
                    target,
                    error,
                    restored,
                })
            }
        }
    }

    /// Move a record without a drag gesture.
    pub async fn move_record(
        &self,
        record_id: impl Into<String>,
        source: StageId,
        target: StageId,
    ) -> Result<TransitionOutcome, BoardError> {
        self.begin_drag(record_id, source)?;
        self.drop_on(target).await
    }
}
