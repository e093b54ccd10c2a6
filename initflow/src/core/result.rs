//! Per-attempt load results.

use super::{LoadError, NodeState};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// The immutable record of one execution or reload attempt of a node.
///
/// The store keeps only the latest result per node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    /// Id of the node that ran.
    pub node_id: String,
    /// Display name of the node that ran.
    pub display_name: String,
    /// State the node ended in.
    pub state: NodeState,
    /// Number of items the work closure reported.
    pub loaded_count: usize,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: f64,
    /// The captured error, if the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LoadError>,
    /// Whether the attempt was a reload.
    #[serde(default)]
    pub reload: bool,
    /// When the attempt finished.
    pub finished_at: Timestamp,
}

impl LoadResult {
    /// Creates a successful result.
    #[must_use]
    pub fn complete(
        node_id: impl Into<String>,
        display_name: impl Into<String>,
        loaded_count: usize,
        duration_ms: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            display_name: display_name.into(),
            state: NodeState::Complete,
            loaded_count,
            duration_ms,
            error: None,
            reload: false,
            finished_at: now_utc(),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(
        node_id: impl Into<String>,
        display_name: impl Into<String>,
        error: LoadError,
        duration_ms: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            display_name: display_name.into(),
            state: NodeState::Failed,
            loaded_count: 0,
            duration_ms,
            error: Some(error),
            reload: false,
            finished_at: now_utc(),
        }
    }

    /// Marks the result as produced by a reload.
    #[must_use]
    pub fn as_reload(mut self) -> Self {
        self.reload = true;
        self
    }

    /// Returns true if the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.state == NodeState::Complete
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
