//! Testing utilities for initflow orchestrators.
//!
//! This module provides:
//! - Work closures that count, fail, panic or record their calls
//! - Assertions over node states and summaries
//! - A fixture wiring an orchestrator to collecting sinks

mod assertions;
mod fixtures;
mod loaders;

pub use assertions::{
    assert_all_complete, assert_node_state, assert_order, assert_summary_counts,
};
pub use fixtures::{init_test_tracing, TestHarness};
pub use loaders::{CountingLoader, ExecutionLog, FlakyLoader};
