//! Lifecycle hooks invoked around a node's work closure.

use super::Node;
use crate::core::LoadError;

/// Callbacks around a node's load attempts.
///
/// All methods default to no-ops. A panicking `before_load` or `after_load`
/// fails the attempt the same way a panicking work closure does; a panicking
/// `on_error` is swallowed.
#[cfg_attr(test, mockall::automock)]
pub trait LoadHooks: Send + Sync {
    /// Called right before the work closure runs.
    fn before_load(&self, _node: &Node) {}

    /// Called after the work closure returned successfully.
    fn after_load(&self, _node: &Node, _loaded_count: usize) {}

    /// Called after the attempt failed.
    fn on_error(&self, _node: &Node, _error: &LoadError) {}
}
