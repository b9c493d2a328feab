//! A target that records what it was called with

use crate::events::EventLog;
use parking_lot::Mutex;
use vigil_core::{Arguments, BodyError, MethodInfo, Target, Value};

/// What the body does when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyBehavior {
    /// Return the method name as a `String`
    Succeed,
    /// Return a [`BodyError`]
    Fail,
    /// Panic
    Panic,
}

/// Records `"body"` into a log on every call
#[derive(Debug)]
pub struct RecordingTarget {
    type_name: String,
    log: EventLog,
    behavior: BodyBehavior,
    received: Mutex<Vec<Arguments>>,
}

impl RecordingTarget {
    /// A target whose body succeeds
    pub fn new(type_name: impl Into<String>, log: EventLog) -> Self {
        Self::with_behavior(type_name, log, BodyBehavior::Succeed)
    }

    /// A target with the given body behavior
    pub fn with_behavior(type_name: impl Into<String>, log: EventLog, behavior: BodyBehavior) -> Self {
        Self {
            type_name: type_name.into(),
            log,
            behavior,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Argument lists received so far
    pub fn received(&self) -> Vec<Arguments> {
        self.received.lock().clone()
    }

    /// Arguments of the latest call
    pub fn last_arguments(&self) -> Option<Arguments> {
        self.received.lock().last().cloned()
    }
}

impl Target for RecordingTarget {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn invoke(&self, method: &MethodInfo, arguments: Arguments) -> Result<Option<Value>, BodyError> {
        self.received.lock().push(arguments);
        self.log.record("body");
        match self.behavior {
            BodyBehavior::Succeed => Ok(Some(Value::new(method.name.clone()))),
            BodyBehavior::Fail => Err(BodyError::msg(format!("{} failed", method.name))),
            BodyBehavior::Panic => panic!("{} panicked", method.name),
        }
    }
}
