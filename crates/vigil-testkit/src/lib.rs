//! Vigil Testing Infrastructure
//!
//! Shared helpers for the unit and integration tests of every Vigil crate:
//! an [`EventLog`] that handlers and targets write to, handler types that
//! record their setup and teardown, a [`RecordingTarget`], fixtures that
//! build small tracked type hierarchies, and one-time tracing setup.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! vigil-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use vigil_testkit::{fixtures, EventLog};
//!
//! let log = EventLog::new();
//! let handler_type = fixtures::recording_handler_type("h", &log);
//! ```

pub mod events;
pub mod fixtures;
pub mod target;
pub mod tracing_setup;

pub use events::EventLog;
pub use fixtures::FailAt;
pub use target::{BodyBehavior, RecordingTarget};
pub use tracing_setup::init_test_tracing;
