//! Per-call identifiers
//!
//! A [`CallId`] correlates one intercepted call's setup actions with its
//! teardown actions. Ids come from a [`CallIdAllocator`], which is the only
//! state every interception path shares unconditionally.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-unique identifier of one intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(u64);

impl CallId {
    /// Id reserved for application-scoped lifecycles; allocators never hand it out
    pub const APPLICATION: CallId = CallId(0);

    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

static PROCESS_ALLOCATOR: Lazy<Arc<CallIdAllocator>> =
    Lazy::new(|| Arc::new(CallIdAllocator::new()));

/// Monotonic source of call ids
#[derive(Debug, Default)]
pub struct CallIdAllocator {
    last: AtomicU64,
}

impl CallIdAllocator {
    /// Fresh allocator; the first id it returns is `call#1`
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// The allocator shared by every proxy that is not given its own
    pub fn process() -> Arc<CallIdAllocator> {
        Arc::clone(&PROCESS_ALLOCATOR)
    }

    /// Allocate the next id
    pub fn next_id(&self) -> CallId {
        CallId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
