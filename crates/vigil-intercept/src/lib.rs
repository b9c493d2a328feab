//! # Vigil Intercept
//!
//! The interception layer. An [`InterceptionProxy`] wraps any [`Target`]
//! and runs every tracked call through a [`Lifecycle`]:
//!
//! ```text
//! invoke(method, args)
//!   -> id = allocator.next_id()
//!   -> lifecycle.initialize(id, TestCall { instance, method, args })
//!   -> target.invoke(method, rewritten args)
//!   -> lifecycle.cleanup(id, ..)        // always, even if the body failed
//! ```
//!
//! Objects are built through the factory contract ([`FactoryRegistry`] and
//! [`Activator`]), which lets a factory hand back a [`RemoteTarget`] living in
//! an [`IsolatedDomain`] instead of a local object.
//!
//! [`Target`]: vigil_core::Target
//! [`Lifecycle`]: vigil_lifecycle::Lifecycle

pub mod application;
pub mod domain;
pub mod errors;
pub mod factory;
pub mod proxy;

pub use application::{application_factory, TestApplication, TestApplicationManager};
pub use domain::{DomainObjects, IsolatedDomain, ObjectId, RemoteTarget};
pub use errors::{ActivationError, InvocationError};
pub use factory::{direct_factory, Activator, Factory, FactoryRegistry, FactoryRequest, TargetConstructor};
pub use proxy::{InterceptionProxy, ProxyBuilder};
