//! Serializable node state for external persistence.

use crate::core::{LoadError, NodeState};
use serde::{Deserialize, Serialize};

/// A point-in-time copy of a node's derived state.
///
/// The orchestrator never persists anything itself; embedders can store
/// these and hand them back through `Store::restore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id.
    pub id: String,
    /// Node state.
    pub state: NodeState,
    /// Items loaded by the last successful attempt.
    pub loaded_count: usize,
    /// Duration of the last attempt in milliseconds.
    pub duration_ms: f64,
    /// Last captured error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LoadError>,
}
