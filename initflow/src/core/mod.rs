//! Core value types for initflow.
//!
//! This module contains the immutable values passed between the node state
//! machine, the store and observers:
//! - Node and stage state enums
//! - Load errors and per-attempt results
//! - Node and stage events
//! - Run summaries

mod error;
mod event;
mod result;
mod status;
mod summary;

pub use error::{LoadError, LoadErrorKind};
pub use event::{NodeEvent, NodeEventKind, StageEvent, StageEventKind};
pub use result::LoadResult;
pub use status::{NodeState, StageState};
pub use summary::{FailureRecord, LoadSummary, ReloadSummary};
