//! Lifecycle manager
//!
//! Owns the `absent → active → released` state machine of every call id.
//! Discovery happens before the ledger is touched, and handler setup and
//! teardown happen after the ledger lock is released.

use crate::discoverer::{ActionDiscoverer, CompositeDiscoverer};
use crate::errors::LifecycleError;
use crate::executor::{ActionExecutor, DefaultActionExecutor};
use crate::ledger::ActionLedger;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_core::{CallId, LifecycleConfig, Metadata, SharedContext};

/// The contract the interception layer drives
pub trait Lifecycle: Send + Sync {
    /// Discover and set up the handlers of a call
    fn initialize(&self, call_id: CallId, context: &SharedContext) -> Result<(), LifecycleError>;

    /// Tear down the handlers of a call, in reverse
    fn cleanup(&self, call_id: CallId, context: &SharedContext) -> Result<(), LifecycleError>;
}

/// Discoverer + executor + ledger
pub struct LifecycleManager {
    discoverer: Arc<dyn ActionDiscoverer>,
    executor: Arc<dyn ActionExecutor>,
    ledger: ActionLedger,
    config: LifecycleConfig,
}

impl LifecycleManager {
    /// Manager with the default configuration
    pub fn new(discoverer: Arc<dyn ActionDiscoverer>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            discoverer,
            executor,
            ledger: ActionLedger::new(),
            config: LifecycleConfig::default(),
        }
    }

    /// Manager routing the built-in context kinds over `metadata`
    pub fn standard(metadata: Arc<Metadata>) -> Self {
        Self::new(
            Arc::new(CompositeDiscoverer::standard(metadata)),
            Arc::new(DefaultActionExecutor),
        )
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Whether `call_id` is initialized and not yet cleaned up
    pub fn is_active(&self, call_id: CallId) -> bool {
        self.ledger.contains(call_id)
    }

    /// Active call ids in ascending order
    pub fn active_calls(&self) -> Vec<CallId> {
        self.ledger.call_ids()
    }

    fn roll_back(&self, call_id: CallId) {
        let Ok(entry) = self.ledger.remove(call_id) else {
            return;
        };
        let mut actions = entry.lock();
        for action in actions.iter_mut().rev() {
            if let Err(err) = self.executor.teardown(action) {
                warn!(%call_id, action = action.id(), error = %err, "teardown failed during rollback");
            }
        }
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("discoverer", &self.discoverer.name())
            .field("ledger", &self.ledger)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Lifecycle for LifecycleManager {
    fn initialize(&self, call_id: CallId, context: &SharedContext) -> Result<(), LifecycleError> {
        let actions = self.discoverer.discover(context)?;
        debug!(%call_id, kind = context.kind(), actions = actions.len(), "initializing call");

        let entry = self.ledger.insert(call_id, actions)?;
        let failure = {
            let mut actions = entry.lock();
            actions.iter_mut().find_map(|action| {
                debug!(%call_id, action = action.id(), "setup");
                self.executor.setup(action).err()
            })
        };

        match failure {
            None => Ok(()),
            Some(err) => {
                warn!(%call_id, error = %err, rollback = self.config.rollback_on_setup_failure, "setup failed");
                if self.config.rollback_on_setup_failure {
                    self.roll_back(call_id);
                }
                Err(err)
            }
        }
    }

    fn cleanup(&self, call_id: CallId, context: &SharedContext) -> Result<(), LifecycleError> {
        let entry = self.ledger.remove(call_id)?;
        debug!(%call_id, kind = context.kind(), "cleaning up call");

        let mut actions = entry.lock();
        for action in actions.iter_mut().rev() {
            debug!(%call_id, action = action.id(), "teardown");
            self.executor.teardown(action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vigil_core::{HandlerDescriptor, Request, RequestCall, VigilError};
    use vigil_testkit::{fixtures, EventLog, FailAt};

    fn manager() -> LifecycleManager {
        LifecycleManager::standard(Arc::new(Metadata::new()))
    }

    fn request_with(descriptors: Vec<HandlerDescriptor>) -> SharedContext {
        let request = descriptors
            .into_iter()
            .fold(Request::new("/"), Request::with_handler);
        Arc::new(RequestCall::new(request))
    }

    fn recorders(log: &EventLog, labels: &[&str]) -> Vec<HandlerDescriptor> {
        labels
            .iter()
            .map(|label| HandlerDescriptor::new(fixtures::recording_handler_type(label, log)))
            .collect()
    }

    #[test]
    fn test_teardown_reverses_setup() {
        let log = EventLog::new();
        let context = request_with(recorders(&log, &["a", "b", "c", "d"]));
        let manager = manager();
        let id = CallId::new(1);

        manager.initialize(id, &context).unwrap();
        assert!(manager.is_active(id));
        manager.cleanup(id, &context).unwrap();
        assert!(!manager.is_active(id));

        assert_eq!(
            log.events(),
            [
                "a-setup", "b-setup", "c-setup", "d-setup",
                "d-teardown", "c-teardown", "b-teardown", "a-teardown",
            ]
        );
    }

    #[test]
    fn test_double_initialize_is_rejected() {
        let context = request_with(Vec::new());
        let manager = manager();
        manager.initialize(CallId::new(1), &context).unwrap();
        assert_matches!(
            manager.initialize(CallId::new(1), &context),
            Err(LifecycleError::Usage(VigilError::DuplicateInitialize { .. }))
        );
    }

    #[test]
    fn test_cleanup_without_initialize_is_rejected() {
        let context = request_with(Vec::new());
        assert_matches!(
            manager().cleanup(CallId::new(9), &context),
            Err(LifecycleError::Usage(VigilError::MissingInitialize { .. }))
        );
    }

    #[test]
    fn test_setup_failure_without_rollback_keeps_entry() {
        let log = EventLog::new();
        let mut descriptors = recorders(&log, &["a", "b"]);
        descriptors.push(HandlerDescriptor::new(fixtures::failing_handler_type(
            "bad",
            &log,
            FailAt::Construct,
        )));
        descriptors.extend(recorders(&log, &["never"]));
        let context = request_with(descriptors);
        let manager = manager();

        assert_matches!(
            manager.initialize(CallId::new(3), &context),
            Err(LifecycleError::Handler(_))
        );
        assert_eq!(log.events(), ["a-setup", "b-setup"]);
        assert_eq!(manager.active_calls(), [CallId::new(3)]);
    }

    #[test]
    fn test_setup_failure_with_rollback_tears_down_constructed() {
        let log = EventLog::new();
        let mut descriptors = recorders(&log, &["a", "b"]);
        descriptors.push(HandlerDescriptor::new(fixtures::failing_handler_type(
            "bad",
            &log,
            FailAt::Context,
        )));
        descriptors.extend(recorders(&log, &["never"]));
        let context = request_with(descriptors);
        let manager = manager().with_config(LifecycleConfig {
            rollback_on_setup_failure: true,
        });

        assert_matches!(
            manager.initialize(CallId::new(4), &context),
            Err(LifecycleError::Handler(_))
        );
        assert_eq!(
            log.events(),
            ["a-setup", "b-setup", "bad-setup", "bad-teardown", "b-teardown", "a-teardown"]
        );
        assert!(!manager.is_active(CallId::new(4)));
    }

    #[test]
    fn test_first_teardown_failure_stops_cleanup() {
        let log = EventLog::new();
        let mut descriptors = recorders(&log, &["a"]);
        descriptors.push(HandlerDescriptor::new(fixtures::failing_handler_type(
            "bad",
            &log,
            FailAt::Release,
        )));
        descriptors.extend(recorders(&log, &["c"]));
        let context = request_with(descriptors);
        let manager = manager();
        let id = CallId::new(5);

        manager.initialize(id, &context).unwrap();
        assert_matches!(manager.cleanup(id, &context), Err(LifecycleError::Handler(_)));
        assert_eq!(
            log.events(),
            ["a-setup", "bad-setup", "c-setup", "c-teardown", "bad-teardown-failed"]
        );
        assert!(!manager.is_active(id));
    }

    #[test]
    fn test_handlers_are_not_shared_between_calls() {
        let log = EventLog::new();
        let context = request_with(recorders(&log, &["h"]));
        let manager = manager();

        manager.initialize(CallId::new(1), &context).unwrap();
        manager.initialize(CallId::new(2), &context).unwrap();
        manager.cleanup(CallId::new(2), &context).unwrap();
        assert!(manager.is_active(CallId::new(1)));
        manager.cleanup(CallId::new(1), &context).unwrap();

        assert_eq!(log.events(), ["h-setup", "h-setup", "h-teardown", "h-teardown"]);
    }
}
