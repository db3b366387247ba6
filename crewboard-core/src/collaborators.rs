//! Hooks the board hands rows to. Both are fire-and-forget: the board never
//! waits on them or inspects a result.

/// Opens the extended detail view for a record.
pub trait DocumentViewer: Send + Sync {
    fn open(&self, record_id: &str);
}

/// Starts a chat or call with a candidate.
pub trait ContactInitiator: Send + Sync {
    fn start_conversation(&self, handle: &str);
}
