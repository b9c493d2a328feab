//! Error taxonomy for Vigil
//!
//! Three families, kept apart so callers can tell who failed:
//! - [`VigilError`]: usage errors raised by the engine itself; always fatal
//! - [`HandlerError`]: raised by a handler's constructor, context setter or
//!   release; the engine passes it through untouched
//! - [`BodyError`]: raised by the intercepted call itself

use crate::call_id::CallId;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Usage errors raised by the lifecycle engine
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// `initialize` ran twice for one call id
    #[error("Concurrency problem: initialize was called more than once for {call_id}")]
    DuplicateInitialize {
        /// The offending call id
        call_id: CallId,
    },

    /// `cleanup` ran for a call id that was never initialized
    #[error("Cleanup requested for {call_id} but initialize was never called for it")]
    MissingInitialize {
        /// The offending call id
        call_id: CallId,
    },

    /// A discoverer was handed a context shape it does not understand
    #[error("Discoverer '{discoverer}' does not support '{context_kind}' contexts")]
    UnsupportedContext {
        /// Name of the rejecting discoverer
        discoverer: &'static str,
        /// Kind reported by the context
        context_kind: String,
    },

    /// No constructor of the handler type accepts the supplied arguments
    #[error(
        "No constructor of handler type '{handler_type}' accepts arguments ({})",
        .argument_types.join(", ")
    )]
    NoCompatibleConstructor {
        /// Handler type name
        handler_type: String,
        /// Runtime type names of the supplied arguments
        argument_types: Vec<String>,
    },

    /// Neither the type nor any ancestor registers a factory
    #[error("Cannot create an instance of '{type_name}': no factory is registered in its inheritance chain")]
    NoFactory {
        /// Requested type
        type_name: String,
    },

    /// Construction re-entered from inside a running factory and no direct constructor exists
    #[error("Re-entrant construction of '{type_name}' and no direct constructor is registered for it")]
    ReentrantConstruction {
        /// Requested type
        type_name: String,
    },

    /// An action was driven through a transition its state does not allow
    #[error("Action '{action_id}' is {state}, expected {expected}")]
    InvalidActionState {
        /// Diagnostic key of the action
        action_id: String,
        /// Current state label
        state: &'static str,
        /// Expected state label
        expected: &'static str,
    },

    /// Method lookup failed along the type's inheritance chain
    #[error("Type '{type_name}' declares no method '{method}'")]
    UnknownMethod {
        /// Type searched
        type_name: String,
        /// Method requested
        method: String,
    },

    /// Type lookup failed
    #[error("Type '{type_name}' is not registered")]
    UnknownType {
        /// Type requested
        type_name: String,
    },

    /// Positional argument index outside the call's argument list
    #[error("Argument index {index} is out of range for a call with {len} arguments")]
    ArgumentOutOfRange {
        /// Requested index
        index: usize,
        /// Number of arguments
        len: usize,
    },

    /// Configuration could not be loaded, validated or applied
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// An isolated execution domain could not service a request
    #[error("Isolated domain error: {message}")]
    Domain {
        /// Description of the problem
        message: String,
    },
}

impl VigilError {
    /// Create an unsupported-context error
    pub fn unsupported_context(discoverer: &'static str, context_kind: impl Into<String>) -> Self {
        Self::UnsupportedContext {
            discoverer,
            context_kind: context_kind.into(),
        }
    }

    /// Create an invalid-action-state error
    pub fn invalid_action_state(
        action_id: impl Into<String>,
        state: &'static str,
        expected: &'static str,
    ) -> Self {
        Self::InvalidActionState {
            action_id: action_id.into(),
            state,
            expected,
        }
    }

    /// Create an unknown-method error
    pub fn unknown_method(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// Create an unknown-type error
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a domain error
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }
}

/// Standard Result type for engine operations
pub type Result<T> = std::result::Result<T, VigilError>;

/// Failure raised inside a handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Plain failure message
    #[error("{message}")]
    Failed {
        /// Description of the failure
        message: String,
    },

    /// Failure carrying the handler's own error value
    #[error("{source}")]
    Source {
        /// The original error
        #[source]
        source: BoxError,
    },
}

impl HandlerError {
    /// Create a failure from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Wrap an existing error
    pub fn from_source(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Source {
            source: Box::new(source),
        }
    }

    /// Borrow the original error as `E`, if that is what the handler raised
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed { .. } => None,
            Self::Source { source } => source.downcast_ref::<E>(),
        }
    }
}

impl From<VigilError> for HandlerError {
    fn from(err: VigilError) -> Self {
        Self::from_source(err)
    }
}

/// Failure raised by the intercepted call body
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// Plain failure message
    #[error("{message}")]
    Failed {
        /// Description of the failure
        message: String,
    },

    /// Failure carrying the body's own error value
    #[error("{source}")]
    Source {
        /// The original error
        #[source]
        source: BoxError,
    },
}

impl BodyError {
    /// Create a failure from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Wrap an existing error
    pub fn from_source(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Source {
            source: Box::new(source),
        }
    }

    /// Borrow the original error as `E`, if that is what the body raised
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed { .. } => None,
            Self::Source { source } => source.downcast_ref::<E>(),
        }
    }
}

impl From<VigilError> for BodyError {
    fn from(err: VigilError) -> Self {
        Self::from_source(err)
    }
}
