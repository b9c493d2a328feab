//! Lifecycle errors

use vigil_core::{HandlerError, VigilError};

/// Failure of `initialize`, `cleanup`, setup or teardown
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The engine was used incorrectly
    #[error(transparent)]
    Usage(#[from] VigilError),

    /// A handler failed; the handler's own error is kept as is
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl LifecycleError {
    /// The usage error, if this is one
    pub fn as_usage(&self) -> Option<&VigilError> {
        match self {
            Self::Usage(err) => Some(err),
            Self::Handler(_) => None,
        }
    }

    /// The handler error, if this is one
    pub fn as_handler(&self) -> Option<&HandlerError> {
        match self {
            Self::Handler(err) => Some(err),
            Self::Usage(_) => None,
        }
    }
}
