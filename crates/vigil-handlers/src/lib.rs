//! # Vigil Handlers
//!
//! Ready-made handlers:
//!
//! - [`ArgumentProviderHandler`]: fills in absent call arguments during setup,
//!   from resource mappings declared on the parameter, method, type or module
//! - [`SequentialHandler`]: holds a named process-wide lock from setup to
//!   teardown, so calls sharing the name never overlap

pub mod arguments;
pub mod sequential;

pub use arguments::{
    provider_handler_type, ArgumentProvider, ArgumentProviderHandler, MappedArgumentProvider,
    ResourceCatalog, ResourceResolver,
};
pub use sequential::{sequential_handler_type, SequentialHandler};

use vigil_core::HandlerCatalog;

/// Register the built-in handlers that need no collaborator under their catalog names
///
/// Currently `sequential`.
pub fn register_builtin(catalog: &mut HandlerCatalog) {
    catalog.register("sequential", sequential_handler_type());
}
