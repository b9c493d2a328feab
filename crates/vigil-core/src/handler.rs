//! Handler capability contracts
//!
//! A handler is any value built from a [`HandlerDescriptor`](crate::HandlerDescriptor).
//! Its behavior during a call comes from two optional capabilities:
//! [`ContextAware`] receives the active call context right after construction,
//! and [`Releasable`] is invoked during teardown. A handler with neither
//! capability does its work in its constructor.

use crate::context::SharedContext;
use crate::errors::HandlerError;

/// A live handler instance
pub trait Handler: Send + 'static {
    /// Context-setter capability, if this handler has one
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        None
    }

    /// Release capability, if this handler has one
    fn as_releasable(&mut self) -> Option<&mut dyn Releasable> {
        None
    }
}

/// Handlers that need the active call context
pub trait ContextAware {
    /// Receive the context; runs immediately after construction
    fn set_context(&mut self, context: &SharedContext) -> Result<(), HandlerError>;
}

/// Handlers that hold something until teardown
pub trait Releasable {
    /// Release whatever setup acquired
    fn release(&mut self) -> Result<(), HandlerError>;
}
