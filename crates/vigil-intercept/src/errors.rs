//! Interception and activation errors

use std::error::Error as StdError;
use vigil_core::{BodyError, VigilError};
use vigil_lifecycle::LifecycleError;

/// Failure of an intercepted call
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The proxy was used incorrectly, e.g. an unknown method
    #[error(transparent)]
    Usage(#[from] VigilError),

    /// Setup or teardown failed; the body either never ran or succeeded
    #[error("lifecycle failure: {0}")]
    Lifecycle(#[source] LifecycleError),

    /// The call body failed and cleanup succeeded
    #[error("call failed: {0}")]
    Body(#[source] BodyError),

    /// The call body failed, then cleanup failed too
    #[error("call failed: {body}; cleanup also failed: {cleanup}")]
    BodyAndCleanup {
        /// The primary failure
        #[source]
        body: BodyError,
        /// The failure raised while cleaning up
        cleanup: LifecycleError,
    },
}

impl InvocationError {
    /// The body error, if the body failed
    pub fn body(&self) -> Option<&BodyError> {
        match self {
            Self::Body(body) | Self::BodyAndCleanup { body, .. } => Some(body),
            Self::Usage(_) | Self::Lifecycle(_) => None,
        }
    }

    /// The lifecycle error, if setup or cleanup failed
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match self {
            Self::Lifecycle(err) | Self::BodyAndCleanup { cleanup: err, .. } => Some(err),
            Self::Usage(_) | Self::Body(_) => None,
        }
    }
}

/// Failure to obtain a target through the factory contract
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// No factory, re-entrant construction without a direct constructor, or a domain failure
    #[error(transparent)]
    Usage(#[from] VigilError),

    /// The type's own constructor failed
    #[error("constructing '{type_name}' failed: {source}")]
    Construction {
        /// Requested type
        type_name: String,
        /// The constructor's error
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ActivationError {
    /// Create a construction error
    pub fn construction(
        type_name: impl Into<String>,
        source: Box<dyn StdError + Send + Sync>,
    ) -> Self {
        Self::Construction {
            type_name: type_name.into(),
            source,
        }
    }
}
