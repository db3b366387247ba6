pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::filter::QuerySpec;
use crate::pagination::PageWindow;
use crate::stages::StageId;
use crate::types::{Record, SortSpec};

/// Rows of one page together with the total matching the same predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub rows: Vec<Record>,
    pub total_count: usize,
}

/// Abstract record store the board reads from and writes stage changes to.
/// Implementations: MemoryStore (in-process); remote backends live with the host app.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of records matching `spec`.
    async fn count(&self, spec: &QuerySpec) -> Result<usize, StoreError>;

    /// One window of records matching `spec`, ordered by `sort`.
    async fn page(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<Vec<Record>, StoreError>;

    /// Rows and total for `spec` observed from the same store state.
    ///
    /// The default issues two queries and is only as consistent as the
    /// backend between them; backends that can answer both at once should
    /// override it.
    async fn page_with_count(
        &self,
        spec: &QuerySpec,
        window: PageWindow,
        sort: SortSpec,
    ) -> Result<PageResult, StoreError> {
        let total_count = self.count(spec).await?;
        let rows = self.page(spec, window, sort).await?;
        Ok(PageResult { rows, total_count })
    }

    /// Persist a record's new stage.
    async fn update_stage(&self, record_id: &str, stage: StageId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
