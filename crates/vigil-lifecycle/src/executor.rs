//! Action execution: constructing handlers and releasing them

use crate::action::{Action, ActionState};
use crate::errors::LifecycleError;
use std::sync::Arc;
use tracing::debug;
use vigil_core::VigilError;

/// Runs the setup and teardown halves of an action
pub trait ActionExecutor: Send + Sync {
    /// Construct the handler and hand it the call context
    fn setup(&self, action: &mut Action) -> Result<(), LifecycleError>;

    /// Release the handler, if it holds anything
    fn teardown(&self, action: &mut Action) -> Result<(), LifecycleError>;
}

/// Constructor resolution, context injection and release
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActionExecutor;

impl ActionExecutor for DefaultActionExecutor {
    fn setup(&self, action: &mut Action) -> Result<(), LifecycleError> {
        let Some(descriptor) = action.descriptor() else {
            return Err(VigilError::invalid_action_state(
                action.id(),
                action.state().label(),
                "pending",
            )
            .into());
        };

        let constructor = descriptor
            .handler_type
            .resolve_constructor(&descriptor.arguments)?;
        let handler = constructor.build(descriptor.arguments.clone())?;
        debug!(action = action.id(), shape = ?constructor.shape(), "constructed handler");

        let context = Arc::clone(action.context());
        *action.state_mut() = ActionState::Live(handler);

        if let ActionState::Live(handler) = action.state_mut() {
            if let Some(aware) = handler.as_context_aware() {
                aware.set_context(&context)?;
            }
        }
        Ok(())
    }

    fn teardown(&self, action: &mut Action) -> Result<(), LifecycleError> {
        match std::mem::replace(action.state_mut(), ActionState::Released) {
            ActionState::Live(mut handler) => {
                if let Some(releasable) = handler.as_releasable() {
                    debug!(action = action.id(), "releasing handler");
                    releasable.release()?;
                }
                Ok(())
            }
            ActionState::Pending(_) | ActionState::Released => Ok(()),
        }
    }
}
