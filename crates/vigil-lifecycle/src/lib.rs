//! # Vigil Lifecycle
//!
//! The per-call lifecycle engine: discoverers decide which handlers apply to
//! a call, the executor builds and releases them, and the
//! [`LifecycleManager`] ties both to a ledger keyed by call id.
//!
//! ```text
//! initialize(id, ctx): discover(ctx) -> ledger.insert(id) -> setup each, in order
//! cleanup(id, ctx):    ledger.remove(id) -> teardown each, in reverse
//! ```

pub mod action;
pub mod discoverer;
pub mod errors;
pub mod executor;
pub mod ledger;
pub mod manager;

pub use action::{Action, ActionState};
pub use discoverer::{
    ActionDiscoverer, ApplicationDiscoverer, CompositeDiscoverer, RequestDiscoverer,
    TestCallDiscoverer,
};
pub use errors::LifecycleError;
pub use executor::{ActionExecutor, DefaultActionExecutor};
pub use ledger::ActionLedger;
pub use manager::{Lifecycle, LifecycleManager};
