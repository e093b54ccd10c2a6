//! # Initflow
//!
//! A dependency-ordered initialization orchestrator.
//!
//! Initflow registers named load tasks (nodes), runs them in an order that
//! respects their declared dependencies and reports progress to observers:
//!
//! - **Dependency ordering**: depth-first topological sort with cycle
//!   detection; cycles are reported and broken, never fatal
//! - **Failure isolation**: a failing or panicking task fails only itself;
//!   its dependents wait, independent tasks carry on
//! - **Stages**: nested groups of nodes with recursive progress and
//!   stage-level dependencies
//! - **Reloads**: re-run a task and cascade to everything that became stale
//! - **Synchronous events**: node and stage events delivered to listeners
//!   on the calling thread
//!
//! ## Quick Start
//!
//! ```rust
//! use initflow::prelude::*;
//!
//! let orchestrator = Orchestrator::new("client");
//! orchestrator.add_node(Node::new("config", "Config", || Ok(1))).unwrap();
//! orchestrator
//!     .add_node(Node::new("textures", "Textures", || Ok(128)).depends_on("config"))
//!     .unwrap();
//!
//! let summary = orchestrator.execute();
//! assert!(summary.all_succeeded());
//! assert_eq!(summary.loaded_items, 129);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod node;
pub mod observability;
pub mod orchestrator;
pub mod stage;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::OrchestratorConfig;
    pub use crate::core::{
        FailureRecord, LoadError, LoadErrorKind, LoadResult, LoadSummary, NodeEvent,
        NodeEventKind, NodeState, ReloadSummary, StageEvent, StageEventKind, StageState,
    };
    pub use crate::errors::{InitflowError, RegistrationError};
    pub use crate::events::{CollectingListener, LoggingListener, Subscription};
    pub use crate::node::{LoadHooks, Node, NodeSnapshot};
    pub use crate::observability::{
        CollectingDiagnostics, Diagnostic, DiagnosticKind, DiagnosticLevel, DiagnosticSink,
        NoOpDiagnostics, TracingDiagnostics,
    };
    pub use crate::orchestrator::{NodeHandle, Orchestrator, StageHandle};
    pub use crate::stage::Stage;
    pub use crate::store::Store;
    pub use crate::utils::{iso_timestamp, Timestamp};
}
