//! # Vigil Core
//!
//! Data model shared by every Vigil layer: opaque argument values, call ids,
//! call contexts, handler descriptors and handler types, the declarative
//! metadata registry and the configuration that populates it.
//!
//! Nothing in this crate runs handlers. Discovery, construction and the
//! per-call ledger live in `vigil-lifecycle`; the interception proxy lives in
//! `vigil-intercept`.

pub mod call_id;
pub mod catalog;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod errors;
pub mod handler;
pub mod metadata;
pub mod target;
pub mod value;

pub use call_id::{CallId, CallIdAllocator};
pub use catalog::HandlerCatalog;
pub use config::{
    ConfigDefaults, ConfigMerge, ConfigValidation, LifecycleConfig, LoggingConfig,
    RegistrationConfig, ScopeConfig, VigilConfig,
};
pub use context::{
    ApplicationCall, ApplicationHost, CallContext, MethodInfo, ParameterInfo, Request,
    RequestCall, Response, SharedContext, TestCall,
};
pub use descriptor::{Constructor, ConstructorShape, FromArgs, HandlerDescriptor, HandlerType};
pub use errors::{BodyError, HandlerError, Result, VigilError};
pub use handler::{ContextAware, Handler, Releasable};
pub use metadata::{Annotation, Metadata, ResourceMapping, Scope, TypeInfo};
pub use target::Target;
pub use value::{Arguments, TypeTag, Value};
