//! Test fixtures: record builders and a store whose timing and failures
//! tests can script.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::filter::QuerySpec;
use crate::pagination::PageWindow;
use crate::stages::StageId;
use crate::storage::memory::MemoryStore;
use crate::storage::{PageResult, RecordStore, StoreError};
use crate::types::{Category, Record, SortSpec};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A driver candidate created `minutes` after a fixed base time.
pub fn candidate(id: &str, name: &str, stage: StageId, minutes: i64) -> Record {
    Record {
        id: id.to_string(),
        name: name.to_string(),
        category: Category::Driver,
        stage,
        phone: None,
        email: None,
        vehicle_id: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes),
    }
}

/// Insert `count` records into `stage`. Ids are `<stage>-<nnn>`; higher
/// numbers are newer; even numbers are drivers and odd numbers helpers.
pub fn seed_stage(store: &MemoryStore, stage: StageId, count: usize) {
    for i in 0..count {
        let mut record = candidate(
            &format!("{}-{:03}", stage, i),
            &format!("Candidate {} {}", stage.label(), i),
            stage,
            i as i64,
        );
        if i % 2 == 1 {
            record.category = Category::Helper;
        }
        store.insert(record);
    }
}

/// Wraps a `MemoryStore` with gates, failure switches and call counters.
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub reads: AtomicUsize,
    pub updates: AtomicUsize,
    pub fail_updates: AtomicBool,
    pub delay_ms: AtomicU64,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    failing_stages: Mutex<HashSet<StageId>>,
    page_gates: Mutex<HashMap<(StageId, usize), Arc<Notify>>>,
    count_gates: Mutex<HashMap<StageId, Arc<Notify>>>,
    update_gate: Mutex<Option<Arc<Notify>>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            failing_stages: Mutex::new(HashSet::new()),
            page_gates: Mutex::new(HashMap::new()),
            count_gates: Mutex::new(HashMap::new()),
            update_gate: Mutex::new(None),
        }
    }

    /// Make every read for `stage` fail until `recover` is called.
    pub fn fail_stage(&self, stage: StageId) {
        self.failing_stages.lock().unwrap().insert(stage);
    }

    pub fn recover(&self, stage: StageId) {
        self.failing_stages.lock().unwrap().remove(&stage);
    }

    /// Block the next page read of `stage` at `offset` until the returned
    /// handle is notified.
    pub fn hold_page(&self, stage: StageId, offset: usize) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.page_gates.lock().unwrap().insert((stage, offset), gate.clone());
        gate
    }

    /// Block the next count-only read of `stage` until the returned handle is notified.
    pub fn hold_count(&self, stage: StageId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.count_gates.lock().unwrap().insert(stage, gate.clone());
        gate
    }

    /// Block the next stage update until the returned handle is notified.
    pub fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn before_read(&self, stage: StageId, offset: Option<usize>) -> Result<InFlight<'_>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let guard = self.enter();
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let gate = match offset {
            Some(offset) => self.page_gates.lock().unwrap().remove(&(stage, offset)),
            None => self.count_gates.lock().unwrap().remove(&stage),
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing_stages.lock().unwrap().contains(&stage) {
            return Err(StoreError::Unavailable(format!("{} offline", stage)));
        }
        Ok(guard)
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn count(&self, spec: &QuerySpec) -> Result<usize, StoreError> {
        let _guard = self.before_read(spec.stage, None).await?;
        self.inner.count(spec).await
    }

    async fn page(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<Vec<Record>, StoreError> {
        let _guard = self.before_read(spec.stage, Some(window.offset)).await?;
        self.inner.page(spec, window, sort).await
    }

    async fn page_with_count(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<PageResult, StoreError> {
        let _guard = self.before_read(spec.stage, Some(window.offset)).await?;
        self.inner.page_with_count(spec, window, sort).await
    }

    async fn update_stage(&self, record_id: &str, stage: StageId) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter();
        let gate = self.update_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update rejected".into()));
        }
        self.inner.update_stage(record_id, stage).await
    }
}
