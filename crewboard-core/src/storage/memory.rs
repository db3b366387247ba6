/// In-process record store.
///
/// Holds every record in a single `RwLock<HashMap>`; queries scan and sort
/// under one read guard so `page_with_count` sees a single consistent state.
/// Used for tests, demos and as the reference for remote adapters.
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{PageResult, RecordStore, StoreError};
use crate::filter::QuerySpec;
use crate::pagination::PageWindow;
use crate::stages::StageId;
use crate::types::{Record, SortSpec};

pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert or replace a record by id.
    pub fn insert(&self, record: Record) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id.clone(), record);
    }

    pub fn get(&self, record_id: &str) -> Option<Record> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(record_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching records in `sort` order.
    fn select(records: &HashMap<String, Record>, spec: &QuerySpec, sort: SortSpec) -> Vec<Record> {
        let query = spec.compile();
        let mut matched: Vec<&Record> = records.values().filter(|r| query.matches(r)).collect();
        match sort {
            SortSpec::NewestFirst => matched.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
        matched.into_iter().cloned().collect()
    }

    fn slice(matched: Vec<Record>, window: PageWindow) -> Vec<Record> {
        matched
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count(&self, spec: &QuerySpec) -> Result<usize, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let query = spec.compile();
        Ok(records.values().filter(|r| query.matches(r)).count())
    }

    async fn page(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<Vec<Record>, StoreError> {
        if window.limit == 0 {
            return Err(StoreError::InvalidQuery("page limit must be positive".into()));
        }
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(Self::slice(Self::select(&records, spec, sort), window))
    }

    async fn page_with_count(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<PageResult, StoreError> {
        if window.limit == 0 {
            return Err(StoreError::InvalidQuery("page limit must be positive".into()));
        }
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let matched = Self::select(&records, spec, sort);
        let total_count = matched.len();
        Ok(PageResult {
            rows: Self::slice(matched, window),
            total_count,
        })
    }

    async fn update_stage(&self, record_id: &str, stage: StageId) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(record_id)
            .ok_or_else(|| StoreError::RecordNotFound(record_id.to_string()))?;
        log::debug!(
            target: "crewboard.storage.memory",
            "Record {} moved {} -> {}",
            record_id,
            record.stage,
            stage
        );
        record.stage = stage;
        Ok(())
    }
}
