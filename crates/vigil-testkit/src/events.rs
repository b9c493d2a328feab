//! Shared, ordered event log

use parking_lot::Mutex;
use std::sync::Arc;

/// Append-only log of events, cloneable across threads
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Events whose text starts with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Position of the first occurrence of `event`
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }

    /// Forget every event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
