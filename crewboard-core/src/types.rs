use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stages::StageId;

/// Role a candidate is applying for. Closed set; drives the category filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Driver,
    Helper,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Driver => "driver",
            Category::Helper => "helper",
        }
    }
}

/// A candidate moving through the hiring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub stage: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Vehicle the candidate brings or is assigned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Handle passed to the contact initiator: phone first, then email.
    pub fn contact_handle(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.trim().is_empty()))
    }
}

/// Ordering applied to every page query. Only one ordering exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortSpec {
    /// Newest `created_at` first, ties broken by id.
    #[default]
    NewestFirst,
}

/// Cached view of one stage: the rows of the current page plus pagination state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageViewState {
    pub rows: Vec<Record>,
    pub total_count: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub is_loading: bool,
    /// Last load or transition failure for this stage, cleared on the next success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for StageViewState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            current_page: 1,
            total_pages: 1,
            is_loading: false,
            error: None,
        }
    }
}

/// Stage view tagged with its stage, for snapshots and event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: StageId,
    pub label: String,
    pub view: StageViewState,
}
