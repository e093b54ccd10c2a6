//! Run summaries.

use super::{LoadError, NodeState};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single failure listed in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Node id.
    pub node_id: String,
    /// Node display name.
    pub display_name: String,
    /// Error message.
    pub error: String,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        display_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            display_name: display_name.into(),
            error: error.into(),
        }
    }
}

/// Aggregate outcome of a store's nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Number of registered nodes.
    pub total: usize,
    /// Nodes in the Complete state.
    pub completed: usize,
    /// Nodes in the Failed state.
    pub failed: usize,
    /// Nodes not yet run (Pending or Running).
    pub pending: usize,
    /// Nodes waiting to re-run after a dependency reloaded.
    pub stale: usize,
    /// Sum of loaded counts over completed nodes.
    pub loaded_items: usize,
    /// Elapsed time between the first start and the last finish, in milliseconds.
    pub duration_ms: f64,
    /// When the first pass started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the last pass finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Every failed node, in registration order.
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl LoadSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one node.
    pub fn record(
        &mut self,
        node_id: &str,
        display_name: &str,
        state: NodeState,
        loaded_count: usize,
        error: Option<&LoadError>,
    ) {
        self.total += 1;
        match state {
            NodeState::Complete => {
                self.completed += 1;
                self.loaded_items += loaded_count;
            }
            NodeState::Failed => {
                self.failed += 1;
                let message =
                    error.map_or_else(|| "unknown error".to_string(), LoadError::full_message);
                self.failures.push(FailureRecord::new(node_id, display_name, message));
            }
            NodeState::Stale => self.stale += 1,
            NodeState::Pending | NodeState::Running => self.pending += 1,
        }
    }

    /// Returns true if every node completed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.completed == self.total
    }

    /// Returns true if any node failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns the fraction of nodes that completed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            write!(
                f,
                "{}/{} nodes loaded ({} items) in {:.1}ms",
                self.completed, self.total, self.loaded_items, self.duration_ms
            )?;
            if self.pending + self.stale > 0 {
                write!(f, ", {} pending, {} stale", self.pending, self.stale)?;
            }
            return Ok(());
        }

        let noun = if self.failures.len() == 1 { "failure" } else { "failures" };
        write!(f, "{} {noun}:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.display_name, failure.error)?;
        }
        Ok(())
    }
}

/// Aggregate outcome of a `reload_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadSummary {
    /// Nodes reloaded successfully.
    pub reloaded: usize,
    /// Nodes whose reload failed.
    pub failed: usize,
    /// Nodes skipped because they are not reloadable.
    pub skipped: usize,
    /// Every failed reload.
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl ReloadSummary {
    /// Returns true if no reload failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for ReloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reloaded, {} failed, {} skipped",
            self.reloaded, self.failed, self.skipped
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.display_name, failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LoadErrorKind;

    #[test]
    fn test_record_counts() {
        let mut summary = LoadSummary::new();
        summary.record("a", "A", NodeState::Complete, 5, None);
        summary.record("b", "B", NodeState::Pending, 0, None);
        summary.record("c", "C", NodeState::Stale, 0, None);
        summary.record("d", "D", NodeState::Running, 0, None);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.stale, 1);
        assert_eq!(summary.loaded_items, 5);
        assert!(!summary.all_succeeded());
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_display_all_succeeded() {
        let mut summary = LoadSummary::new();
        summary.record("a", "A", NodeState::Complete, 3, None);
        assert!(summary.all_succeeded());
        assert!(summary.to_string().starts_with("1/1 nodes loaded (3 items)"));
    }

    #[test]
    fn test_display_lists_failures() {
        let err = LoadError::new(LoadErrorKind::Failed, "missing file");
        let mut summary = LoadSummary::new();
        summary.record("a", "Block Registry", NodeState::Failed, 0, Some(&err));
        summary.record("b", "Items", NodeState::Pending, 0, None);

        let text = summary.to_string();
        assert!(text.starts_with("1 failure:"));
        assert!(text.contains("Block Registry: missing file"));
    }

    #[test]
    fn test_success_rate_empty() {
        assert!((LoadSummary::new().success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reload_summary_display() {
        let summary = ReloadSummary {
            reloaded: 2,
            failed: 1,
            skipped: 3,
            failures: vec![FailureRecord::new("x", "X", "nope")],
        };
        assert!(!summary.all_succeeded());
        assert_eq!(summary.to_string(), "2 reloaded, 1 failed, 3 skipped\n  - X: nope");
    }
}
