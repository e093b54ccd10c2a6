//! Node and stage events delivered to subscribers.

use super::{LoadError, LoadResult, NodeState, StageState};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The transition a [`NodeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEventKind {
    /// The node started executing.
    Started,
    /// The node completed successfully.
    Completed,
    /// The node (or its reload) failed.
    Failed,
    /// The node was marked stale because a dependency reloaded.
    Stale,
    /// A reload of the node started.
    ReloadStarted,
    /// A reload of the node completed successfully.
    ReloadCompleted,
}

impl NodeEventKind {
    /// Returns the dotted event type string, e.g. `node.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started => "node.started",
            Self::Completed => "node.completed",
            Self::Failed => "node.failed",
            Self::Stale => "node.stale",
            Self::ReloadStarted => "node.reload_started",
            Self::ReloadCompleted => "node.reload_completed",
        }
    }
}

impl fmt::Display for NodeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// An immutable notification of a node state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// What happened.
    pub kind: NodeEventKind,
    /// The node id.
    pub node_id: String,
    /// The node display name.
    pub display_name: String,
    /// The node state right after the transition.
    pub state: NodeState,
    /// Items loaded by the attempt (completion events only).
    #[serde(default)]
    pub loaded_count: usize,
    /// Duration of the attempt in milliseconds (completion events only).
    #[serde(default)]
    pub duration_ms: f64,
    /// The captured error for failure events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LoadError>,
    /// When the event was created.
    pub timestamp: Timestamp,
}

impl NodeEvent {
    /// Creates a new node event.
    #[must_use]
    pub fn new(
        kind: NodeEventKind,
        node_id: impl Into<String>,
        display_name: impl Into<String>,
        state: NodeState,
    ) -> Self {
        Self {
            kind,
            node_id: node_id.into(),
            display_name: display_name.into(),
            state,
            loaded_count: 0,
            duration_ms: 0.0,
            error: None,
            timestamp: now_utc(),
        }
    }

    /// Creates an event carrying the outcome of a load attempt.
    #[must_use]
    pub fn from_result(kind: NodeEventKind, result: &LoadResult) -> Self {
        Self {
            kind,
            node_id: result.node_id.clone(),
            display_name: result.display_name.clone(),
            state: result.state,
            loaded_count: result.loaded_count,
            duration_ms: result.duration_ms,
            error: result.error.clone(),
            timestamp: now_utc(),
        }
    }

    /// Returns the dotted event type string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// The transition a [`StageEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEventKind {
    /// The stage started.
    StageStarted,
    /// A node of the stage completed.
    NodeComplete,
    /// A node of the stage failed.
    NodeFailed,
    /// The stage ended without failures.
    StageComplete,
    /// The stage ended with at least one failed node.
    StageFailed,
}

impl StageEventKind {
    /// Returns the dotted event type string, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted => "stage.started",
            Self::NodeComplete => "stage.node_complete",
            Self::NodeFailed => "stage.node_failed",
            Self::StageComplete => "stage.complete",
            Self::StageFailed => "stage.failed",
        }
    }
}

impl fmt::Display for StageEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// An immutable notification of a stage transition or stage progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// What happened.
    pub kind: StageEventKind,
    /// The stage id.
    pub stage_id: String,
    /// The stage display name.
    pub display_name: String,
    /// The stage state right after the transition.
    pub state: StageState,
    /// The node that caused the event, for node-level stage events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Nodes completed so far (recursive).
    pub completed: usize,
    /// Nodes failed so far (recursive).
    pub failed: usize,
    /// Total nodes in the stage (recursive).
    pub total: usize,
    /// Fraction of processed nodes, `0.0..=1.0`.
    pub progress: f64,
    /// When the event was created.
    pub timestamp: Timestamp,
}

impl StageEvent {
    /// Creates a new stage event with empty progress.
    #[must_use]
    pub fn new(
        kind: StageEventKind,
        stage_id: impl Into<String>,
        display_name: impl Into<String>,
        state: StageState,
    ) -> Self {
        Self {
            kind,
            stage_id: stage_id.into(),
            display_name: display_name.into(),
            state,
            node_id: None,
            completed: 0,
            failed: 0,
            total: 0,
            progress: 1.0,
            timestamp: now_utc(),
        }
    }

    /// Sets the node that caused the event.
    #[must_use]
    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Sets the progress counters.
    #[must_use]
    pub fn with_counts(mut self, completed: usize, failed: usize, total: usize) -> Self {
        self.completed = completed;
        self.failed = failed;
        self.total = total;
        self.progress = if total == 0 {
            1.0
        } else {
            (completed + failed) as f64 / total as f64
        };
        self
    }

    /// Returns the dotted event type string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}
