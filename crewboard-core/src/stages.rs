/// Pipeline stages and the per-stage load state the board keeps for each.
///
/// Stage order is fixed and matches the board's column order. Any stage may
/// move a record to any other stage; there is no adjacency rule.
use serde::{Deserialize, Serialize};

use crate::pagination;
use crate::types::{Record, StageSummary, StageViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Registered,
    Qualified,
    Documentation,
    ContractSent,
    Hired,
    Reconsideration,
    Rejected,
}

impl StageId {
    /// All stages in board order.
    pub const ALL: [StageId; 7] = [
        StageId::Registered,
        StageId::Qualified,
        StageId::Documentation,
        StageId::ContractSent,
        StageId::Hired,
        StageId::Reconsideration,
        StageId::Rejected,
    ];

    /// Position of the stage in board order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn definition(self) -> &'static StageDefinition {
        &STAGES[self.index()]
    }

    pub fn label(self) -> &'static str {
        self.definition().label
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Registered => "registered",
            StageId::Qualified => "qualified",
            StageId::Documentation => "documentation",
            StageId::ContractSent => "contract_sent",
            StageId::Hired => "hired",
            StageId::Reconsideration => "reconsideration",
            StageId::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentational metadata for a stage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    pub id: StageId,
    pub label: &'static str,
    /// Column accent colour (CSS hex).
    pub color: &'static str,
}

pub const STAGES: [StageDefinition; 7] = [
    StageDefinition { id: StageId::Registered, label: "Registered", color: "#64748b" },
    StageDefinition { id: StageId::Qualified, label: "Qualified", color: "#0ea5e9" },
    StageDefinition { id: StageId::Documentation, label: "Documentation", color: "#6366f1" },
    StageDefinition { id: StageId::ContractSent, label: "Contract Sent", color: "#f59e0b" },
    StageDefinition { id: StageId::Hired, label: "Hired", color: "#22c55e" },
    StageDefinition { id: StageId::Reconsideration, label: "Reconsideration", color: "#a855f7" },
    StageDefinition { id: StageId::Rejected, label: "Rejected", color: "#ef4444" },
];

/// Load state for one stage: the visible view plus request bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct StageSlot {
    pub view: StageViewState,
    /// Ticket of the newest row request issued for this stage.
    pub(crate) latest_rows_ticket: u64,
    /// Ticket of the newest count that has been applied.
    pub(crate) applied_count_ticket: u64,
    /// Bumped whenever rows are replaced with store data.
    pub(crate) rows_generation: u64,
}

impl StageSlot {
    /// Apply an authoritative total and keep the pagination invariants.
    pub(crate) fn apply_total(&mut self, total_count: usize, page_size: usize) {
        self.view.total_count = total_count;
        self.view.total_pages = pagination::compute_total_pages(total_count, page_size);
        self.view.current_page = pagination::clamp_page(self.view.current_page, self.view.total_pages);
    }

    /// Replace the visible rows with a fresh page from the store.
    pub(crate) fn apply_rows(&mut self, rows: Vec<Record>, page: usize) {
        self.view.rows = rows;
        self.view.current_page = pagination::clamp_page(page, self.view.total_pages);
        self.rows_generation += 1;
    }
}

/// Ordered collection of stage slots, one per [`StageId`].
#[derive(Debug, Clone)]
pub struct StageRegistry {
    slots: Vec<StageSlot>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            slots: StageId::ALL.iter().map(|_| StageSlot::default()).collect(),
        }
    }

    pub fn slot(&self, stage: StageId) -> &StageSlot {
        &self.slots[stage.index()]
    }

    pub(crate) fn slot_mut(&mut self, stage: StageId) -> &mut StageSlot {
        &mut self.slots[stage.index()]
    }

    pub fn view(&self, stage: StageId) -> &StageViewState {
        &self.slot(stage).view
    }

    /// Send every stage back to page 1, recomputing page counts for a new page size.
    pub fn reset_pages(&mut self, page_size: usize) {
        for slot in &mut self.slots {
            slot.view.total_pages = pagination::compute_total_pages(slot.view.total_count, page_size);
            slot.view.current_page = 1;
            slot.view.rows.truncate(page_size);
        }
    }

    pub fn summaries(&self) -> Vec<StageSummary> {
        StageId::ALL
            .iter()
            .map(|&stage| StageSummary {
                stage,
                label: stage.label().to_string(),
                view: self.view(stage).clone(),
            })
            .collect()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_definitions() {
        for (i, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
            assert_eq!(STAGES[i].id, *stage);
        }
        assert_eq!(StageId::ContractSent.label(), "Contract Sent");
    }

    #[test]
    fn test_apply_total_clamps_current_page() {
        let mut slot = StageSlot::default();
        slot.view.current_page = 4;
        slot.view.total_pages = 4;
        slot.apply_total(120, 50);
        assert_eq!(slot.view.total_pages, 3);
        assert_eq!(slot.view.current_page, 3);

        slot.apply_total(0, 50);
        assert_eq!(slot.view.total_pages, 1);
        assert_eq!(slot.view.current_page, 1);
    }

    #[test]
    fn test_reset_pages() {
        let mut registry = StageRegistry::new();
        let slot = registry.slot_mut(StageId::Hired);
        slot.apply_total(90, 10);
        slot.view.current_page = 7;

        registry.reset_pages(50);
        let view = registry.view(StageId::Hired);
        assert_eq!(view.current_page, 1);
        assert_eq!(view.total_pages, 2);
    }

    #[test]
    fn test_stage_serde_names() {
        let json = serde_json::to_string(&StageId::ContractSent).unwrap();
        assert_eq!(json, "\"contract_sent\"");
        assert_eq!(StageId::ContractSent.to_string(), "contract_sent");
    }
}
