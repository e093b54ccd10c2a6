//! Dependency ordering with cycle detection.

use crate::node::Node;
use crate::observability::{Diagnostic, DiagnosticKind};
use crate::store::Store;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A dependency edge, `(dependent, dependency)`.
pub type Edge = (String, String);

/// Outcome of ordering a set of nodes.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    /// Nodes in an order where each follows its resolvable dependencies.
    pub order: Vec<Arc<Node>>,
    /// Edges dropped to break dependency cycles.
    pub severed: HashSet<Edge>,
    /// Edges to ids that are not registered anywhere.
    pub missing: Vec<Edge>,
}

impl ExecutionPlan {
    /// Returns the node ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(|n| n.id()).collect()
    }

    /// Returns true if the given edge was severed.
    #[must_use]
    pub fn is_severed(&self, dependent: &str, dependency: &str) -> bool {
        self.severed
            .contains(&(dependent.to_string(), dependency.to_string()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

struct Sorter<'a> {
    store: &'a Store,
    members: HashMap<&'a str, &'a Arc<Node>>,
    marks: HashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    plan: ExecutionPlan,
}

/// Orders `nodes` so that every node comes after its dependencies.
///
/// Traversal starts from the nodes in the order given. Dependencies are
/// only followed within `nodes`: an id registered in `store` but outside
/// the set is left alone, an id not registered at all is reported as
/// missing. Reaching a node already on the current path severs that edge.
#[must_use]
pub fn topological_order(nodes: &[Arc<Node>], store: &Store) -> ExecutionPlan {
    let mut sorter = Sorter {
        store,
        members: nodes.iter().map(|n| (n.id(), n)).collect(),
        marks: HashMap::with_capacity(nodes.len()),
        path: Vec::new(),
        plan: ExecutionPlan::default(),
    };
    for node in nodes {
        sorter.visit(node);
    }
    sorter.plan
}

/// Returns every node that depends on `root`, directly or transitively,
/// in the order of `nodes`. `root` itself is never included.
#[must_use]
pub fn transitive_dependents(root: &str, nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
    let mut reached: HashSet<&str> = HashSet::from([root]);
    let mut frontier = vec![root];
    while let Some(id) = frontier.pop() {
        for node in nodes.iter().filter(|n| n.has_dependency(id)) {
            if reached.insert(node.id()) {
                frontier.push(node.id());
            }
        }
    }
    nodes
        .iter()
        .filter(|n| n.id() != root && reached.contains(n.id()))
        .cloned()
        .collect()
}

impl<'a> Sorter<'a> {
    fn visit(&mut self, node: &'a Arc<Node>) {
        let id = node.id();
        if self.marks.contains_key(id) {
            return;
        }
        self.marks.insert(id, Mark::Visiting);
        self.path.push(id);

        for dep in node.dependencies() {
            match self.members.get(dep.as_str()).copied() {
                Some(dep_node) => match self.marks.get(dep.as_str()).copied() {
                    None => self.visit(dep_node),
                    Some(Mark::Visiting) => self.sever(id, dep),
                    Some(Mark::Visited) => {}
                },
                None if self.store.contains_node(dep) => {}
                None => self.report_missing(id, dep),
            }
        }

        self.path.pop();
        self.marks.insert(id, Mark::Visited);
        self.plan.order.push(Arc::clone(node));
    }

    fn sever(&mut self, id: &str, dep: &str) {
        let start = self.path.iter().position(|n| *n == dep).unwrap_or(0);
        let mut cycle: Vec<&str> = self.path[start..].to_vec();
        cycle.push(dep);
        self.store.emit(
            Diagnostic::error(
                DiagnosticKind::CycleDetected,
                format!(
                    "Dependency cycle detected at '{id}': {}; ignoring edge {id} -> {dep}",
                    cycle.join(" -> ")
                ),
            )
            .with_subject(id),
        );
        self.plan.severed.insert((id.to_string(), dep.to_string()));
    }

    fn report_missing(&mut self, id: &str, dep: &str) {
        self.store.emit(
            Diagnostic::warn(
                DiagnosticKind::MissingDependency,
                format!("Node '{id}' depends on unregistered node '{dep}'"),
            )
            .with_subject(id),
        );
        self.plan.missing.push((id.to_string(), dep.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CollectingDiagnostics;
    use pretty_assertions::assert_eq;

    fn setup(nodes: Vec<Node>) -> (Store, Arc<CollectingDiagnostics>, Vec<Arc<Node>>) {
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let store = Store::with_diagnostics("graph", diagnostics.clone());
        let nodes = nodes.into_iter().map(|n| store.register(n).unwrap()).collect();
        (store, diagnostics, nodes)
    }

    fn node(id: &str, deps: &[&str]) -> Node {
        Node::new(id, id, || Ok(0)).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_dependencies_come_first() {
        let (store, diagnostics, nodes) = setup(vec![
            node("ui", &["assets", "config"]),
            node("assets", &["config"]),
            node("config", &[]),
        ]);
        let plan = topological_order(&nodes, &store);
        assert_eq!(plan.ids(), vec!["config", "assets", "ui"]);
        assert!(plan.severed.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_registration_order_kept_for_independent_nodes() {
        let (store, _, nodes) = setup(vec![node("c", &[]), node("a", &[]), node("b", &[])]);
        assert_eq!(topological_order(&nodes, &store).ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_cycle_is_severed_once() {
        let (store, diagnostics, nodes) = setup(vec![node("a", &["b"]), node("b", &["a"])]);
        let plan = topological_order(&nodes, &store);

        assert_eq!(plan.ids(), vec!["b", "a"]);
        assert!(plan.is_severed("b", "a"));
        assert_eq!(plan.severed.len(), 1);
        assert!(diagnostics.contains(DiagnosticKind::CycleDetected, "b"));
    }

    #[test]
    fn test_long_cycle_message_names_path() {
        let (store, diagnostics, nodes) =
            setup(vec![node("a", &["b"]), node("b", &["c"]), node("c", &["a"])]);
        let plan = topological_order(&nodes, &store);
        assert_eq!(plan.order.len(), 3);
        let cycle = diagnostics.of_kind(DiagnosticKind::CycleDetected);
        assert_eq!(cycle.len(), 1);
        assert!(cycle[0].message.contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_missing_dependency_warned() {
        let (store, diagnostics, nodes) = setup(vec![node("a", &["ghost"]), node("b", &[])]);
        let plan = topological_order(&nodes, &store);
        assert_eq!(plan.ids(), vec!["a", "b"]);
        assert_eq!(plan.missing, vec![("a".to_string(), "ghost".to_string())]);
        assert!(diagnostics.contains(DiagnosticKind::MissingDependency, "a"));
    }

    #[test]
    fn test_registered_dependency_outside_set_not_traversed() {
        let (store, diagnostics, nodes) = setup(vec![node("core", &[]), node("field", &["core"])]);
        let subset = vec![Arc::clone(&nodes[1])];
        let plan = topological_order(&subset, &store);
        assert_eq!(plan.ids(), vec!["field"]);
        assert!(plan.missing.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_transitive_dependents_follow_every_path() {
        let (_, _, nodes) = setup(vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
            node("e", &[]),
        ]);
        let ids: Vec<String> = transitive_dependents("a", &nodes)
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_self_edge_is_severed() {
        let (store, diagnostics, nodes) = setup(vec![node("a", &["a"])]);
        let plan = topological_order(&nodes, &store);
        assert_eq!(plan.ids(), vec!["a"]);
        assert!(plan.is_severed("a", "a"));
        let cycle = diagnostics.of_kind(DiagnosticKind::CycleDetected);
        assert!(cycle[0].message.contains("a -> a"));
    }

    #[test]
    fn test_transitive_dependents_stop_at_cycles() {
        let (_, _, nodes) = setup(vec![node("a", &["b"]), node("b", &["a"])]);
        let ids: Vec<String> = transitive_dependents("a", &nodes)
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }
}
