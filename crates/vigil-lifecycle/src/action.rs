//! Actions: one handler descriptor on its way to a live instance and back

use std::fmt;
use vigil_core::{Handler, HandlerDescriptor, SharedContext};

/// Where an action is in its lifecycle
pub enum ActionState {
    /// Discovered, not yet constructed
    Pending(HandlerDescriptor),
    /// Constructed and, if context-aware, given its context
    Live(Box<dyn Handler>),
    /// Torn down
    Released,
}

impl ActionState {
    /// Short state name for diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            ActionState::Pending(_) => "pending",
            ActionState::Live(_) => "live",
            ActionState::Released => "released",
        }
    }
}

impl fmt::Debug for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Pending(descriptor) => f.debug_tuple("Pending").field(descriptor).finish(),
            ActionState::Live(_) => f.write_str("Live"),
            ActionState::Released => f.write_str("Released"),
        }
    }
}

/// A handler descriptor bound to the context of one call
#[derive(Debug)]
pub struct Action {
    id: String,
    state: ActionState,
    context: SharedContext,
}

impl Action {
    /// New pending action
    pub fn new(id: impl Into<String>, descriptor: HandlerDescriptor, context: SharedContext) -> Self {
        Self {
            id: id.into(),
            state: ActionState::Pending(descriptor),
            context,
        }
    }

    /// Diagnostic key
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> &ActionState {
        &self.state
    }

    /// Mutable state, for executors
    pub fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }

    /// Context the handler receives
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Descriptor while the action is still pending
    pub fn descriptor(&self) -> Option<&HandlerDescriptor> {
        match &self.state {
            ActionState::Pending(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}
