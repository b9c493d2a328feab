//! Handler types and tracked hierarchies for tests
//!
//! Every recording handler writes `"<label>-<event>"` entries into an
//! [`EventLog`], so ordering assertions read as plain string lists.

use crate::events::EventLog;
use std::sync::Arc;
use vigil_core::{
    Arguments, ContextAware, Handler, HandlerError, HandlerType, Metadata, MethodInfo, Releasable,
    SharedContext, Target, TestCall, TypeInfo,
};

/// A handler with no capabilities
#[derive(Debug)]
pub struct Noop;

impl Handler for Noop {}

/// Handler type named `label` with a single parameterless constructor
pub fn noop_handler_type(label: &str) -> Arc<HandlerType> {
    HandlerType::builder(label).constructor(|(): ()| Ok(Noop)).build()
}

/// Records `<label>-setup` on construction and `<label>-teardown` on release
pub struct Recording {
    label: String,
    log: EventLog,
}

impl Releasable for Recording {
    fn release(&mut self) -> Result<(), HandlerError> {
        self.log.record(format!("{}-teardown", self.label));
        Ok(())
    }
}

impl Handler for Recording {
    fn as_releasable(&mut self) -> Option<&mut dyn Releasable> {
        Some(self)
    }
}

/// Handler type whose instances record setup and teardown into `log`
pub fn recording_handler_type(label: &str, log: &EventLog) -> Arc<HandlerType> {
    let label = label.to_string();
    let log = log.clone();
    HandlerType::builder(label.clone())
        .constructor(move |(): ()| {
            log.record(format!("{label}-setup"));
            Ok(Recording {
                label: label.clone(),
                log: log.clone(),
            })
        })
        .build()
}

/// Records construction, context injection (with the context kind) and release
pub struct Observing {
    label: String,
    log: EventLog,
}

impl ContextAware for Observing {
    fn set_context(&mut self, context: &SharedContext) -> Result<(), HandlerError> {
        self.log.record(format!("{}-context:{}", self.label, context.kind()));
        Ok(())
    }
}

impl Releasable for Observing {
    fn release(&mut self) -> Result<(), HandlerError> {
        self.log.record(format!("{}-release", self.label));
        Ok(())
    }
}

impl Handler for Observing {
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }

    fn as_releasable(&mut self) -> Option<&mut dyn Releasable> {
        Some(self)
    }
}

/// Handler type whose instances record `-new`, `-context:<kind>` and `-release`
pub fn observing_handler_type(label: &str, log: &EventLog) -> Arc<HandlerType> {
    let label = label.to_string();
    let log = log.clone();
    HandlerType::builder(label.clone())
        .constructor(move |(): ()| {
            log.record(format!("{label}-new"));
            Ok(Observing {
                label: label.clone(),
                log: log.clone(),
            })
        })
        .build()
}

/// Where a failing handler fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    /// The constructor returns an error; nothing is recorded
    Construct,
    /// Construction records `-setup`, then the context setter fails
    Context,
    /// Construction records `-setup`; release records `-teardown-failed` and fails
    Release,
}

/// A handler that fails at a chosen point
pub struct Failing {
    label: String,
    log: EventLog,
    fail_at: FailAt,
}

impl ContextAware for Failing {
    fn set_context(&mut self, _context: &SharedContext) -> Result<(), HandlerError> {
        if self.fail_at == FailAt::Context {
            return Err(HandlerError::msg(format!("{} rejected its context", self.label)));
        }
        Ok(())
    }
}

impl Releasable for Failing {
    fn release(&mut self) -> Result<(), HandlerError> {
        if self.fail_at == FailAt::Release {
            self.log.record(format!("{}-teardown-failed", self.label));
            return Err(HandlerError::msg(format!("{} failed to release", self.label)));
        }
        self.log.record(format!("{}-teardown", self.label));
        Ok(())
    }
}

impl Handler for Failing {
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }

    fn as_releasable(&mut self) -> Option<&mut dyn Releasable> {
        Some(self)
    }
}

/// Handler type that fails at `fail_at`
pub fn failing_handler_type(label: &str, log: &EventLog, fail_at: FailAt) -> Arc<HandlerType> {
    let label = label.to_string();
    let log = log.clone();
    HandlerType::builder(label.clone())
        .constructor(move |(): ()| {
            if fail_at == FailAt::Construct {
                return Err(HandlerError::msg(format!("{label} failed to construct")));
            }
            log.record(format!("{label}-setup"));
            Ok(Failing {
                label: label.clone(),
                log: log.clone(),
                fail_at,
            })
        })
        .build()
}

/// Handler type that records which constructor built it
///
/// The `(String)` constructor records `exact:<value>`; the variadic one
/// records `variadic:<argument count>`.
pub fn shape_reporting_handler_type(log: &EventLog) -> Arc<HandlerType> {
    let exact_log = log.clone();
    let variadic_log = log.clone();
    HandlerType::builder("ShapeReporter")
        .variadic(move |arguments| {
            variadic_log.record(format!("variadic:{}", arguments.len()));
            Ok(Noop)
        })
        .constructor(move |(value,): (String,)| {
            exact_log.record(format!("exact:{value}"));
            Ok(Noop)
        })
        .build()
}

/// `LiveTest` (module `core`) and `CartTest: LiveTest` (module `checkout`)
///
/// `LiveTest` declares `warm_up()`; `CartTest` declares `adds_item(sku: String)`
/// and `removes_item(sku: String)`.
pub fn cart_hierarchy() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.register_type(
        TypeInfo::new("LiveTest")
            .in_module("core")
            .with_method(MethodInfo::new("warm_up")),
    );
    metadata.register_type(
        TypeInfo::new("CartTest")
            .extends("LiveTest")
            .in_module("checkout")
            .with_method(MethodInfo::new("adds_item").with_parameter::<String>("sku"))
            .with_method(MethodInfo::new("removes_item").with_parameter::<String>("sku")),
    );
    metadata
}

/// Context for calling `method` on `target`, resolved through `metadata`
pub fn test_call(
    metadata: Arc<Metadata>,
    target: Arc<dyn Target>,
    method: &str,
    arguments: Arguments,
) -> SharedContext {
    let method = metadata
        .find_method(target.type_name(), method)
        .expect("fixture method must be registered")
        .clone();
    Arc::new(TestCall::new(metadata, target, method, arguments))
}
