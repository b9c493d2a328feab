//! Named sequential locks
//!
//! A [`SequentialHandler`] takes a process-wide lock identified by name when
//! it is constructed and gives it back when it is released. Calls declaring
//! handlers with the same name are serialized; calls with different names
//! are unaffected.
//!
//! The lock is a flag plus a condition variable rather than a held mutex
//! guard, since setup and teardown may happen on different threads.

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};
use vigil_core::{Handler, HandlerError, HandlerType, Releasable};

/// A lock that can be acquired on one thread and released on another
#[derive(Default)]
struct NamedLock {
    locked: Mutex<bool>,
    available: Condvar,
}

impl NamedLock {
    fn acquire(&self) {
        let mut locked = self.locked.lock();
        while *locked {
            self.available.wait(&mut locked);
        }
        *locked = true;
    }

    fn release(&self) {
        *self.locked.lock() = false;
        self.available.notify_one();
    }
}

static LOCKS: Lazy<Mutex<HashMap<String, Arc<NamedLock>>>> = Lazy::new(Default::default);

fn named_lock(name: &str) -> Arc<NamedLock> {
    Arc::clone(LOCKS.lock().entry(name.to_string()).or_default())
}

/// Holds the lock `name` from construction until release
pub struct SequentialHandler {
    name: String,
    lock: Arc<NamedLock>,
    held: bool,
}

impl SequentialHandler {
    /// Lock name used by the parameterless constructor
    pub const DEFAULT_NAME: &'static str = "default";

    /// Block until the lock `name` is free, then take it
    pub fn acquire(name: impl Into<String>) -> Self {
        let name = name.into();
        let lock = named_lock(&name);
        lock.acquire();
        trace!(lock = %name, "sequential lock acquired");
        Self {
            name,
            lock,
            held: true,
        }
    }

    /// Name of the lock
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the lock is still held by this handler
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Releasable for SequentialHandler {
    fn release(&mut self) -> Result<(), HandlerError> {
        if std::mem::replace(&mut self.held, false) {
            self.lock.release();
            trace!(lock = %self.name, "sequential lock released");
        }
        Ok(())
    }
}

impl Handler for SequentialHandler {
    fn as_releasable(&mut self) -> Option<&mut dyn Releasable> {
        Some(self)
    }
}

impl Drop for SequentialHandler {
    fn drop(&mut self) {
        if self.held {
            warn!(lock = %self.name, "sequential handler dropped without release");
            self.held = false;
            self.lock.release();
        }
    }
}

impl fmt::Debug for SequentialHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialHandler")
            .field("name", &self.name)
            .field("held", &self.held)
            .finish()
    }
}

/// `SequentialHandler`, constructible with no arguments or with a lock name
pub fn sequential_handler_type() -> Arc<HandlerType> {
    HandlerType::builder("SequentialHandler")
        .constructor(|(): ()| Ok(SequentialHandler::acquire(SequentialHandler::DEFAULT_NAME)))
        .constructor(|(name,): (String,)| Ok(SequentialHandler::acquire(name)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use vigil_core::Value;

    #[test]
    #[serial]
    fn test_same_name_never_overlaps() {
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let mut handler = SequentialHandler::acquire("overlap");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        handler.release().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[serial]
    fn test_different_names_do_not_block() {
        let mut first = SequentialHandler::acquire("alpha");
        let mut second = SequentialHandler::acquire("beta");
        assert!(first.is_held() && second.is_held());
        first.release().unwrap();
        second.release().unwrap();
    }

    #[test]
    #[serial]
    fn test_release_is_idempotent_and_drop_frees_lock() {
        let mut handler = SequentialHandler::acquire("idem");
        handler.release().unwrap();
        handler.release().unwrap();
        assert!(!handler.is_held());

        drop(SequentialHandler::acquire("idem"));
        let again = SequentialHandler::acquire("idem");
        assert_eq!(again.name(), "idem");
    }

    #[test]
    #[serial]
    fn test_handler_type_constructors() {
        let handler_type = sequential_handler_type();

        let default = handler_type.resolve_constructor(&[]).unwrap();
        let mut built = default.build(Vec::new()).unwrap();
        built.as_releasable().unwrap().release().unwrap();

        let args = vec![Value::new("named".to_string())];
        let named = handler_type.resolve_constructor(&args).unwrap();
        let mut built = named.build(args).unwrap();
        built.as_releasable().unwrap().release().unwrap();
    }
}
