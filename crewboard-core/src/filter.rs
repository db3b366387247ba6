use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::stages::StageId;
use crate::types::{Category, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "category")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

/// Board-wide filter: free-text search plus category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEngine {
    search_term: String,
    category_filter: CategoryFilter,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn category_filter(&self) -> CategoryFilter {
        self.category_filter
    }

    /// Returns true when the term actually changed.
    pub fn set_search_term(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if term == self.search_term {
            return false;
        }
        self.search_term = term;
        true
    }

    /// Returns true when the filter actually changed.
    pub fn set_category_filter(&mut self, filter: CategoryFilter) -> bool {
        if filter == self.category_filter {
            return false;
        }
        self.category_filter = filter;
        true
    }

    /// Predicate for one stage under the current filter.
    pub fn build_predicate(&self, stage: StageId) -> QuerySpec {
        let category = match self.category_filter {
            CategoryFilter::All => None,
            CategoryFilter::Only(category) => Some(category),
        };
        let term = self.search_term.trim();
        QuerySpec {
            stage,
            category,
            search: (!term.is_empty()).then(|| term.to_string()),
        }
    }
}

/// Query predicate sent to the record store.
///
/// `stage` is always pinned. `category` adds an equality clause. `search`
/// adds a case-insensitive "name contains OR id contains" clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub stage: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl QuerySpec {
    pub fn for_stage(stage: StageId) -> Self {
        Self {
            stage,
            category: None,
            search: None,
        }
    }

    /// True when only the stage clause is present.
    pub fn is_stage_only(&self) -> bool {
        self.category.is_none() && self.search.is_none()
    }

    /// Normalise the search term once so the predicate can be run over many records.
    pub fn compile(&self) -> CompiledQuery<'_> {
        CompiledQuery {
            spec: self,
            needle: self.search.as_deref().map(normalize_for_search),
        }
    }

    /// Evaluate the predicate in memory against a single record.
    pub fn matches(&self, record: &Record) -> bool {
        self.compile().matches(record)
    }
}

/// A [`QuerySpec`] with its search term already normalised.
#[derive(Debug, Clone)]
pub struct CompiledQuery<'a> {
    spec: &'a QuerySpec,
    needle: Option<String>,
}

impl CompiledQuery<'_> {
    pub fn needle(&self) -> Option<&str> {
        self.needle.as_deref()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if record.stage != self.spec.stage {
            return false;
        }
        if let Some(category) = self.spec.category {
            if record.category != category {
                return false;
            }
        }
        match &self.needle {
            Some(needle) => {
                normalize_for_search(&record.name).contains(needle.as_str())
                    || normalize_for_search(&record.id).contains(needle.as_str())
            }
            None => true,
        }
    }
}

/// Lowercases, NFD-decomposes and strips combining marks, so "jose" matches "José".
pub fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}
