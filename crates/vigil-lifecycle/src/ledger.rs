//! Per-call action ledger
//!
//! Maps a call id to the actions discovered for it. The map lock covers only
//! insert, lookup and remove; each entry carries its own lock so handler
//! setup and teardown never hold up unrelated calls.

use crate::action::Action;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use vigil_core::{CallId, VigilError};

/// Actions of one call
pub type LedgerEntry = Arc<Mutex<Vec<Action>>>;

/// Call id → ordered actions
#[derive(Debug, Default)]
pub struct ActionLedger {
    entries: Mutex<HashMap<CallId, LedgerEntry>>,
}

impl ActionLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the actions of a new call
    pub fn insert(&self, call_id: CallId, actions: Vec<Action>) -> Result<LedgerEntry, VigilError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&call_id) {
            return Err(VigilError::DuplicateInitialize { call_id });
        }
        let entry = Arc::new(Mutex::new(actions));
        entries.insert(call_id, Arc::clone(&entry));
        trace!(%call_id, active = entries.len(), "ledger insert");
        Ok(entry)
    }

    /// Actions of an active call
    pub fn get(&self, call_id: CallId) -> Option<LedgerEntry> {
        self.entries.lock().get(&call_id).cloned()
    }

    /// Take a call's actions out of the ledger
    pub fn remove(&self, call_id: CallId) -> Result<LedgerEntry, VigilError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .remove(&call_id)
            .ok_or(VigilError::MissingInitialize { call_id })?;
        trace!(%call_id, active = entries.len(), "ledger remove");
        Ok(entry)
    }

    /// Whether the call is active
    pub fn contains(&self, call_id: CallId) -> bool {
        self.entries.lock().contains_key(&call_id)
    }

    /// Active call ids in ascending order
    pub fn call_ids(&self) -> Vec<CallId> {
        let mut ids: Vec<CallId> = self.entries.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of active calls
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no call is active
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
