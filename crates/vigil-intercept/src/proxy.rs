//! The interception proxy
//!
//! A decorator around a [`Target`] with a single dynamic entry point,
//! [`InterceptionProxy::invoke`]. Tracked calls get a fresh call id and run
//! between `initialize` and `cleanup` of the configured lifecycle. Cleanup
//! runs even when the body returns an error or panics; a panic resumes after
//! cleanup.

use crate::errors::InvocationError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use vigil_core::{
    Arguments, BodyError, CallIdAllocator, Metadata, MethodInfo, SharedContext, Target, TestCall,
    Value,
};
use vigil_lifecycle::Lifecycle;

/// Wraps a target and runs tracked calls through a lifecycle
pub struct InterceptionProxy {
    target: Arc<dyn Target>,
    metadata: Arc<Metadata>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    call_ids: Arc<CallIdAllocator>,
    tracked_root: Option<String>,
}

/// Builder for [`InterceptionProxy`]
pub struct ProxyBuilder {
    proxy: InterceptionProxy,
}

impl ProxyBuilder {
    /// Run tracked calls through `lifecycle`; without one every call is forwarded
    pub fn lifecycle(mut self, lifecycle: Arc<dyn Lifecycle>) -> Self {
        self.proxy.lifecycle = Some(lifecycle);
        self
    }

    /// Allocate call ids from `call_ids`
    pub fn call_ids(mut self, call_ids: Arc<CallIdAllocator>) -> Self {
        self.proxy.call_ids = call_ids;
        self
    }

    /// Only track methods declared on `root` or its subtypes
    pub fn tracking(mut self, root: impl Into<String>) -> Self {
        self.proxy.tracked_root = Some(root.into());
        self
    }

    /// Finish the proxy
    pub fn build(self) -> InterceptionProxy {
        self.proxy
    }
}

impl InterceptionProxy {
    /// Start building a proxy around `target`
    ///
    /// Defaults: no lifecycle, the process-wide call id allocator, and every
    /// registered method tracked.
    pub fn builder(target: Arc<dyn Target>, metadata: Arc<Metadata>) -> ProxyBuilder {
        ProxyBuilder {
            proxy: InterceptionProxy {
                target,
                metadata,
                lifecycle: None,
                call_ids: CallIdAllocator::process(),
                tracked_root: None,
            },
        }
    }

    /// The wrapped target
    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// Whether calls of `method` go through the lifecycle
    pub fn is_tracked(&self, method: &MethodInfo) -> bool {
        if self.lifecycle.is_none() {
            return false;
        }
        match &self.tracked_root {
            Some(root) => self.metadata.is_subtype_of(&method.declaring_type, root),
            None => true,
        }
    }

    /// Call `method_name` on the target
    pub fn invoke(
        &self,
        method_name: &str,
        arguments: Arguments,
    ) -> Result<Option<Value>, InvocationError> {
        let method = self
            .metadata
            .find_method(self.target.type_name(), method_name)?
            .clone();
        self.dispatch(method, arguments)
    }

    fn dispatch(
        &self,
        method: MethodInfo,
        arguments: Arguments,
    ) -> Result<Option<Value>, InvocationError> {
        let lifecycle = match &self.lifecycle {
            Some(lifecycle) if self.is_tracked(&method) => lifecycle,
            _ => {
                trace!(method = %method.name, "forwarding untracked call");
                return self
                    .target
                    .invoke(&method, arguments)
                    .map_err(InvocationError::Body);
            }
        };

        let call_id = self.call_ids.next_id();
        debug!(%call_id, target = self.target.type_name(), method = %method.name, "intercepted call");

        let call = Arc::new(TestCall::new(
            Arc::clone(&self.metadata),
            Arc::clone(&self.target),
            method.clone(),
            arguments,
        ));
        let context: SharedContext = call.clone();

        lifecycle
            .initialize(call_id, &context)
            .map_err(InvocationError::Lifecycle)?;

        let arguments = call.arguments();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.target.invoke(&method, arguments)
        }));
        let cleanup = lifecycle.cleanup(call_id, &context);

        match (outcome, cleanup) {
            (Err(payload), cleanup) => {
                if let Err(err) = cleanup {
                    warn!(%call_id, error = %err, "cleanup failed after the call panicked");
                }
                panic::resume_unwind(payload)
            }
            (Ok(Ok(value)), Ok(())) => Ok(value),
            (Ok(Ok(_)), Err(err)) => Err(InvocationError::Lifecycle(err)),
            (Ok(Err(body)), Ok(())) => Err(InvocationError::Body(body)),
            (Ok(Err(body)), Err(cleanup)) => {
                warn!(%call_id, error = %cleanup, "cleanup failed after the call failed");
                Err(InvocationError::BodyAndCleanup { body, cleanup })
            }
        }
    }
}

impl Target for InterceptionProxy {
    fn type_name(&self) -> &str {
        self.target.type_name()
    }

    fn invoke(&self, method: &MethodInfo, arguments: Arguments) -> Result<Option<Value>, BodyError> {
        self.dispatch(method.clone(), arguments).map_err(|err| match err {
            InvocationError::Body(body) => body,
            other => BodyError::from_source(other),
        })
    }
}

impl std::fmt::Debug for InterceptionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionProxy")
            .field("target", &self.target.type_name())
            .field("hosted", &self.lifecycle.is_some())
            .field("tracked_root", &self.tracked_root)
            .finish_non_exhaustive()
    }
}
