//! The factory contract
//!
//! Tracked objects are never built directly. The [`Activator`] looks up a
//! factory along the requested type's inheritance chain and lets it produce
//! the real target; the result is then wrapped in an [`InterceptionProxy`].
//! A factory may build the object locally or obtain it from another domain.
//!
//! A construction request issued while a factory is already running on the
//! same thread is re-entrant. It skips the factory lookup and uses the
//! type's direct constructor, which is how a factory builds the plain object
//! it was asked for.

use crate::errors::ActivationError;
use crate::proxy::InterceptionProxy;
use parking_lot::RwLock;
use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vigil_core::{Arguments, CallIdAllocator, Metadata, Target, VigilError};
use vigil_lifecycle::Lifecycle;

/// Builds a plain target from its constructor arguments
pub type TargetConstructor =
    Arc<dyn Fn(Arguments) -> Result<Arc<dyn Target>, Box<dyn StdError + Send + Sync>> + Send + Sync>;

/// Produces the real target for a construction request
pub type Factory =
    Arc<dyn Fn(FactoryRequest<'_>) -> Result<Arc<dyn Target>, ActivationError> + Send + Sync>;

/// What a factory is asked to build
pub struct FactoryRequest<'a> {
    /// The type the caller asked for
    pub requested_type: &'a str,
    /// The caller's constructor arguments
    pub arguments: Arguments,
    /// The activator running the factory, for nested construction
    pub activator: &'a Activator,
}

impl fmt::Debug for FactoryRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRequest")
            .field("requested_type", &self.requested_type)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Factory that builds the requested type in place
///
/// It re-enters the activator, which takes the direct-constructor path.
pub fn direct_factory() -> Factory {
    Arc::new(|request: FactoryRequest<'_>| {
        request
            .activator
            .instantiate(request.requested_type, request.arguments)
    })
}

/// Factories and direct constructors, by type name
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<HashMap<String, Factory>>,
    constructors: RwLock<HashMap<String, TargetConstructor>>,
}

impl FactoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `type_name` and its subtypes
    pub fn register_factory(&self, type_name: impl Into<String>, factory: Factory) {
        self.factories.write().insert(type_name.into(), factory);
    }

    /// Register the direct constructor of `type_name`
    pub fn register_constructor<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(Arguments) -> Result<Arc<dyn Target>, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .write()
            .insert(type_name.into(), Arc::new(constructor));
    }

    /// Nearest factory along the inheritance chain of `type_name`
    pub fn factory_for(&self, type_name: &str, metadata: &Metadata) -> Option<Factory> {
        let factories = self.factories.read();
        if let Some(factory) = factories.get(type_name) {
            return Some(Arc::clone(factory));
        }
        metadata
            .ancestry(type_name)
            .iter()
            .find_map(|info| factories.get(&info.name).cloned())
    }

    /// Direct constructor of exactly `type_name`
    pub fn constructor(&self, type_name: &str) -> Option<TargetConstructor> {
        self.constructors.read().get(type_name).cloned()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factories: Vec<String> = self.factories.read().keys().cloned().collect();
        factories.sort();
        let mut constructors: Vec<String> = self.constructors.read().keys().cloned().collect();
        constructors.sort();
        f.debug_struct("FactoryRegistry")
            .field("factories", &factories)
            .field("constructors", &constructors)
            .finish()
    }
}

thread_local! {
    static IN_FACTORY: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a factory until dropped
struct FactoryScope {
    previous: bool,
}

impl FactoryScope {
    fn enter() -> Self {
        Self {
            previous: IN_FACTORY.with(|flag| flag.replace(true)),
        }
    }

    fn active() -> bool {
        IN_FACTORY.with(Cell::get)
    }
}

impl Drop for FactoryScope {
    fn drop(&mut self) {
        let previous = self.previous;
        IN_FACTORY.with(|flag| flag.set(previous));
    }
}

/// Entry point for building tracked objects
#[derive(Clone)]
pub struct Activator {
    registry: Arc<FactoryRegistry>,
    metadata: Arc<Metadata>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    call_ids: Arc<CallIdAllocator>,
    tracked_root: Option<String>,
}

impl Activator {
    /// Activator producing unhosted proxies that forward every call directly
    pub fn new(registry: Arc<FactoryRegistry>, metadata: Arc<Metadata>) -> Self {
        Self {
            registry,
            metadata,
            lifecycle: None,
            call_ids: CallIdAllocator::process(),
            tracked_root: None,
        }
    }

    /// Run tracked calls of created proxies through `lifecycle`
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn Lifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Allocate call ids from `call_ids` instead of the process allocator
    pub fn with_call_ids(mut self, call_ids: Arc<CallIdAllocator>) -> Self {
        self.call_ids = call_ids;
        self
    }

    /// Only track methods declared on `root` or its subtypes
    pub fn tracking(mut self, root: impl Into<String>) -> Self {
        self.tracked_root = Some(root.into());
        self
    }

    /// The registry factories are looked up in
    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// Obtain the real target for `type_name`
    pub fn instantiate(
        &self,
        type_name: &str,
        arguments: Arguments,
    ) -> Result<Arc<dyn Target>, ActivationError> {
        if FactoryScope::active() {
            debug!(type_name, "re-entrant construction, using direct constructor");
            let constructor = self
                .registry
                .constructor(type_name)
                .ok_or_else(|| VigilError::ReentrantConstruction {
                    type_name: type_name.to_string(),
                })?;
            return constructor(arguments)
                .map_err(|source| ActivationError::construction(type_name, source));
        }

        let factory = self
            .registry
            .factory_for(type_name, &self.metadata)
            .ok_or_else(|| VigilError::NoFactory {
                type_name: type_name.to_string(),
            })?;
        debug!(type_name, "running factory");

        let _scope = FactoryScope::enter();
        factory(FactoryRequest {
            requested_type: type_name,
            arguments,
            activator: self,
        })
    }

    /// Obtain the real target for `type_name` and wrap it in a proxy
    pub fn create(
        &self,
        type_name: &str,
        arguments: Arguments,
    ) -> Result<InterceptionProxy, ActivationError> {
        let target = self.instantiate(type_name, arguments)?;
        Ok(self.wrap(target))
    }

    /// Wrap an existing target in a proxy configured like this activator
    pub fn wrap(&self, target: Arc<dyn Target>) -> InterceptionProxy {
        let mut builder = InterceptionProxy::builder(target, Arc::clone(&self.metadata))
            .call_ids(Arc::clone(&self.call_ids));
        if let Some(lifecycle) = &self.lifecycle {
            builder = builder.lifecycle(Arc::clone(lifecycle));
        }
        if let Some(root) = &self.tracked_root {
            builder = builder.tracking(root.clone());
        }
        builder.build()
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("registry", &self.registry)
            .field("hosted", &self.lifecycle.is_some())
            .field("tracked_root", &self.tracked_root)
            .finish_non_exhaustive()
    }
}
