//! Node and stage state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Registered but not yet run.
    #[default]
    Pending,
    /// The work closure is currently running.
    Running,
    /// The last run succeeded.
    Complete,
    /// The last run failed.
    Failed,
    /// A dependency was reloaded; the node must run again.
    Stale,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

impl NodeState {
    /// Returns true if the node has finished a run (Complete or Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Returns true if the node is eligible to run in the next pass.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Pending | Self::Stale)
    }
}

/// The lifecycle state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Not yet started.
    #[default]
    Pending,
    /// Nodes of the stage are executing.
    Running,
    /// Ended without any contained node failing.
    Complete,
    /// Ended with at least one contained node failed.
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageState {
    /// Returns true if the stage has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}
