//! Stages: hierarchical groups of nodes with aggregate progress.
//!
//! A stage is populated before registration and is read-only in structure
//! afterwards; only its runtime status (state, counters, timestamps)
//! changes while the orchestrator drives it.

use crate::core::{NodeState, StageEvent, StageEventKind, StageState};
use crate::node::Node;
use crate::utils::{now_utc, Timestamp};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct StageStatus {
    state: StageState,
    completed: usize,
    failed: usize,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

/// A named group of nodes and nested sub-stages representing a phase.
pub struct Stage {
    id: String,
    display_name: String,
    nodes: Vec<Arc<Node>>,
    sub_stages: Vec<Arc<Stage>>,
    stage_dependencies: Vec<String>,
    status: RwLock<StageStatus>,
}

impl Stage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            nodes: Vec::new(),
            sub_stages: Vec::new(),
            stage_dependencies: Vec::new(),
            status: RwLock::new(StageStatus::default()),
        }
    }

    /// Adds a node to the stage.
    pub fn add(&mut self, node: Node) -> &mut Self {
        self.nodes.push(Arc::new(node));
        self
    }

    /// Adds a nested stage.
    pub fn add_sub_stage(&mut self, stage: Self) -> &mut Self {
        self.sub_stages.push(Arc::new(stage));
        self
    }

    /// Records that this stage may only start after stage `id` completed.
    pub fn depends_on(&mut self, id: impl Into<String>) -> &mut Self {
        let id = id.into();
        if !self.stage_dependencies.contains(&id) {
            self.stage_dependencies.push(id);
        }
        self
    }

    /// Records a dependency on another stage.
    pub fn depends_on_stage(&mut self, other: &Self) -> &mut Self {
        self.depends_on(other.id.clone())
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.add(node);
        self
    }

    /// Builder form of [`add_sub_stage`](Self::add_sub_stage).
    #[must_use]
    pub fn with_sub_stage(mut self, stage: Self) -> Self {
        self.add_sub_stage(stage);
        self
    }

    /// Builder form of [`depends_on`](Self::depends_on).
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on(id);
        self
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the stage's own nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Returns the nested stages in insertion order.
    #[must_use]
    pub fn sub_stages(&self) -> &[Arc<Self>] {
        &self.sub_stages
    }

    /// Returns the ids of stages that must complete first.
    #[must_use]
    pub fn stage_dependencies(&self) -> &[String] {
        &self.stage_dependencies
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.status.read().state
    }

    /// Nodes of this stage (not sub-stages) completed in the current run.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.status.read().completed
    }

    /// Nodes of this stage (not sub-stages) failed in the current run.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.status.read().failed
    }

    /// Completed nodes including sub-stages.
    #[must_use]
    pub fn completed_total(&self) -> usize {
        self.completed_count() + self.sub_stages.iter().map(|s| s.completed_total()).sum::<usize>()
    }

    /// Failed nodes including sub-stages.
    #[must_use]
    pub fn failed_total(&self) -> usize {
        self.failed_count() + self.sub_stages.iter().map(|s| s.failed_total()).sum::<usize>()
    }

    /// All nodes in this stage and its sub-stages.
    #[must_use]
    pub fn total_node_count(&self) -> usize {
        self.nodes.len() + self.sub_stages.iter().map(|s| s.total_node_count()).sum::<usize>()
    }

    /// Completed plus failed nodes, recursively.
    #[must_use]
    pub fn processed_node_count(&self) -> usize {
        self.completed_total() + self.failed_total()
    }

    /// Fraction of processed nodes; `1.0` for an empty stage.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let total = self.total_node_count();
        if total == 0 {
            return 1.0;
        }
        self.processed_node_count() as f64 / total as f64
    }

    /// When the stage last started.
    #[must_use]
    pub fn started_at(&self) -> Option<Timestamp> {
        self.status.read().started_at
    }

    /// When the stage last finished.
    #[must_use]
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.status.read().finished_at
    }

    /// Returns true if the node id belongs to this stage or a sub-stage.
    #[must_use]
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id() == node_id)
            || self.sub_stages.iter().any(|s| s.contains_node(node_id))
    }

    /// Own nodes followed by sub-stage nodes, depth first.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<Arc<Node>> {
        let mut out = self.nodes.clone();
        for sub in &self.sub_stages {
            out.extend(sub.all_nodes());
        }
        out
    }

    /// Every nested stage, depth first, excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<Arc<Self>> {
        let mut out = Vec::new();
        for sub in &self.sub_stages {
            out.push(Arc::clone(sub));
            out.extend(sub.descendants());
        }
        out
    }

    /// Returns true if any node of the stage or its sub-stages can still run.
    #[must_use]
    pub fn has_runnable_nodes(&self) -> bool {
        self.all_nodes().iter().any(|n| n.state().is_runnable())
    }

    /// Clears counters, returns the stage (and sub-stages) to Pending and
    /// marks every contained Complete or Failed node Stale.
    pub fn reset(&self) {
        *self.status.write() = StageStatus::default();
        for node in &self.nodes {
            node.mark_stale();
        }
        for sub in &self.sub_stages {
            sub.reset();
        }
    }

    /// Builds a stage event carrying the current recursive counters.
    #[must_use]
    pub fn event(&self, kind: StageEventKind) -> StageEvent {
        StageEvent::new(kind, &self.id, &self.display_name, self.state()).with_counts(
            self.completed_total(),
            self.failed_total(),
            self.total_node_count(),
        )
    }

    /// Marks the stage Running and seeds its counters from the current node
    /// states, so nodes finished in an earlier pass count as processed.
    pub(crate) fn begin(&self) {
        let (completed, failed) = self.nodes.iter().fold((0, 0), |(c, f), node| match node.state() {
            NodeState::Complete => (c + 1, f),
            NodeState::Failed => (c, f + 1),
            _ => (c, f),
        });
        *self.status.write() = StageStatus {
            state: StageState::Running,
            completed,
            failed,
            started_at: Some(now_utc()),
            finished_at: None,
        };
    }

    /// Counts one processed node of this stage.
    pub(crate) fn record_node(&self, state: NodeState) {
        let mut status = self.status.write();
        match state {
            NodeState::Complete => status.completed += 1,
            NodeState::Failed => status.failed += 1,
            _ => {}
        }
    }

    /// Ends the stage: Failed if any contained node failed, else Complete.
    pub(crate) fn finish(&self) -> StageState {
        let state = if self.failed_total() > 0 {
            StageState::Failed
        } else {
            StageState::Complete
        };
        let mut status = self.status.write();
        status.state = state;
        status.finished_at = Some(now_utc());
        state
    }

    /// Keeps only the own nodes for which `keep` returns true, recursively.
    ///
    /// Only possible before the stage is shared; sub-stages that are already
    /// shared are left untouched and reported back.
    pub(crate) fn retain_nodes<F>(&mut self, keep: &mut F) -> Vec<String>
    where
        F: FnMut(&Arc<Node>) -> bool,
    {
        self.nodes.retain(|n| keep(n));
        let mut shared = Vec::new();
        for sub in &mut self.sub_stages {
            match Arc::get_mut(sub) {
                Some(sub) => shared.extend(sub.retain_nodes(keep)),
                None => shared.push(sub.id.clone()),
            }
        }
        shared
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("nodes", &self.nodes.iter().map(|n| n.id()).collect::<Vec<_>>())
            .field("sub_stages", &self.sub_stages)
            .field("stage_dependencies", &self.stage_dependencies)
            .field("state", &self.state())
            .finish()
    }
}
