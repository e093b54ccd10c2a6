//! Test assertions for orchestrator state.

use crate::core::{LoadSummary, NodeState};
use crate::orchestrator::Orchestrator;

/// Asserts that a node is in the expected state.
pub fn assert_node_state(orchestrator: &Orchestrator, id: &str, expected: NodeState) {
    let actual = orchestrator.store().get_state(id);
    assert_eq!(
        actual, expected,
        "Expected node '{id}' to be {expected}, got {actual}"
    );
}

/// Asserts that every registered node is Complete.
pub fn assert_all_complete(orchestrator: &Orchestrator) {
    let unfinished: Vec<String> = orchestrator
        .store()
        .nodes()
        .iter()
        .filter(|n| n.state() != NodeState::Complete)
        .map(|n| format!("{} ({})", n.id(), n.state()))
        .collect();
    assert!(
        unfinished.is_empty(),
        "Expected all nodes complete, unfinished: {unfinished:?}"
    );
}

/// Asserts completed/failed/pending counts of a summary.
pub fn assert_summary_counts(
    summary: &LoadSummary,
    completed: usize,
    failed: usize,
    pending: usize,
) {
    assert_eq!(
        (summary.completed, summary.failed, summary.pending),
        (completed, failed, pending),
        "Expected (completed, failed, pending) = ({completed}, {failed}, {pending}), got {summary}"
    );
}

/// Asserts that `before` appears earlier than `after` in `order`.
pub fn assert_order(order: &[String], before: &str, after: &str) {
    let position = |id: &str| order.iter().position(|e| e == id);
    match (position(before), position(after)) {
        (Some(b), Some(a)) => assert!(
            b < a,
            "Expected '{before}' before '{after}' in {order:?}"
        ),
        _ => panic!("Expected both '{before}' and '{after}' in {order:?}"),
    }
}
