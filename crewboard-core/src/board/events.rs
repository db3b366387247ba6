/// Events published by the board controller to its subscribers.
use serde::{Deserialize, Serialize};

use crate::filter::CategoryFilter;
use crate::stages::StageId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    StageLoaded {
        stage: StageId,
        total_count: usize,
        current_page: usize,
        total_pages: usize,
    },
    StageLoadFailed {
        stage: StageId,
        message: String,
    },
    PageSizeChanged {
        page_size: usize,
    },
    FilterChanged {
        search_term: String,
        category_filter: CategoryFilter,
    },
    TransitionCommitted {
        record_id: String,
        source: StageId,
        target: StageId,
    },
    TransitionFailed {
        record_id: String,
        source: StageId,
        target: StageId,
        message: String,
        /// Whether the record was put back into the source stage's rows.
        restored: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_internally_tagged() {
        let event = BoardEvent::StageLoadFailed {
            stage: StageId::Qualified,
            message: "Store unavailable: reset".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StageLoadFailed");
        assert_eq!(json["stage"], "qualified");

        let back: BoardEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
