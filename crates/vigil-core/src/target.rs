//! The invocation contract shared by local objects and remote references

use crate::context::MethodInfo;
use crate::errors::BodyError;
use crate::value::{Arguments, Value};

/// Something calls can be dispatched to
///
/// A local test object and a reference into an isolated domain implement the
/// same contract, so interception cannot tell them apart.
pub trait Target: Send + Sync {
    /// Registered name of the concrete type behind this target
    fn type_name(&self) -> &str;

    /// Run `method` with the given positional arguments
    fn invoke(&self, method: &MethodInfo, arguments: Arguments) -> Result<Option<Value>, BodyError>;
}
