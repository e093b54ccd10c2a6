//! Accessor façades over registered nodes and stages.

use super::Orchestrator;
use crate::core::{
    LoadError, LoadResult, NodeEvent, NodeEventKind, NodeState, StageEvent, StageState,
};
use crate::events::Subscription;
use crate::node::Node;
use crate::stage::Stage;
use std::fmt;
use std::sync::Arc;

/// Read access and control over one registered node.
#[derive(Clone)]
pub struct NodeHandle<'a> {
    orchestrator: &'a Orchestrator,
    node: Arc<Node>,
}

impl<'a> NodeHandle<'a> {
    pub(super) fn new(orchestrator: &'a Orchestrator, node: Arc<Node>) -> Self {
        Self { orchestrator, node }
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.node.id()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.node.display_name()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.node.state()
    }

    /// Returns true if Complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == NodeState::Complete
    }

    /// Returns true if Failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state() == NodeState::Failed
    }

    /// Returns true if the node supports reloads.
    #[must_use]
    pub fn is_reloadable(&self) -> bool {
        self.node.is_reloadable()
    }

    /// Returns the count of the last successful run.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.node.loaded_count()
    }

    /// Returns the duration of the last run.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.node.duration_ms()
    }

    /// Returns the error of the last failed run.
    #[must_use]
    pub fn last_error(&self) -> Option<LoadError> {
        self.node.last_error()
    }

    /// Returns the latest result recorded in the store.
    #[must_use]
    pub fn result(&self) -> Option<LoadResult> {
        self.orchestrator.store().get_result(self.id())
    }

    /// Returns the underlying node.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Reloads the node and cascades to its dependents.
    pub fn reload(&self) -> bool {
        self.orchestrator.reload(self.id())
    }

    /// Returns the node to Pending and forgets its recorded result.
    pub fn reset(&self) -> bool {
        self.orchestrator.reset_node(self.id())
    }

    /// Marks the node Stale, firing a stale event if it changed.
    pub fn mark_stale(&self) -> bool {
        self.orchestrator.mark_stale(self.id())
    }

    /// Calls `callback` whenever the node completes a load or reload.
    pub fn on_complete<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if matches!(
                event.kind,
                NodeEventKind::Completed | NodeEventKind::ReloadCompleted
            ) {
                callback(event);
            }
        })
    }

    /// Calls `callback` for every event of this node.
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        self.orchestrator
            .store()
            .subscribe_filtered(callback, [self.id()])
    }
}

impl fmt::Debug for NodeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Read access and control over one registered stage.
#[derive(Clone)]
pub struct StageHandle<'a> {
    orchestrator: &'a Orchestrator,
    stage: Arc<Stage>,
}

impl<'a> StageHandle<'a> {
    pub(super) fn new(orchestrator: &'a Orchestrator, stage: Arc<Stage>) -> Self {
        Self {
            orchestrator,
            stage,
        }
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.stage.id()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.stage.display_name()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.stage.state()
    }

    /// Returns true if Complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == StageState::Complete
    }

    /// Returns processed / total over the whole stage tree.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.stage.progress()
    }

    /// Returns completed nodes across the stage tree.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.stage.completed_total()
    }

    /// Returns failed nodes across the stage tree.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.stage.failed_total()
    }

    /// Returns the number of nodes in the stage tree.
    #[must_use]
    pub fn total_node_count(&self) -> usize {
        self.stage.total_node_count()
    }

    /// Returns the ids of every node in the stage tree.
    #[must_use]
    pub fn node_ids(&self) -> Vec<String> {
        self.stage
            .all_nodes()
            .iter()
            .map(|n| n.id().to_string())
            .collect()
    }

    /// Returns the underlying stage.
    #[must_use]
    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    /// Returns the stage to Pending and marks its nodes Stale.
    pub fn reset(&self) {
        self.stage.reset();
    }

    /// Calls `callback` for every event of this stage.
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.orchestrator
            .store()
            .subscribe_stages_filtered(callback, [self.id()])
    }
}

impl fmt::Debug for StageHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}
