//! Ready-made listeners.

use crate::core::{NodeEvent, NodeEventKind, StageEvent};
use crate::store::Store;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// A listener that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    /// The log level to use for non-failure events.
    level: Level,
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingListener {
    /// Creates a new logging listener with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging listener.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Subscribes this listener to both event streams of `store`.
    pub fn attach(self, store: &Store) {
        let nodes = self.clone();
        store.subscribe(move |event| nodes.on_node_event(event));
        store.subscribe_stages(move |event| self.on_stage_event(event));
    }

    /// Logs a node event. Failures are always logged at warn level.
    pub fn on_node_event(&self, event: &NodeEvent) {
        if event.kind == NodeEventKind::Failed {
            warn!(
                event_type = %event.event_type(),
                node = %event.node_id,
                error = ?event.error.as_ref().map(|e| e.message.as_str()),
                "{} failed",
                event.display_name
            );
            return;
        }
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.event_type(),
                node = %event.node_id,
                state = %event.state,
                loaded = event.loaded_count,
                duration_ms = event.duration_ms,
                "Event: {}", event.event_type()
            );
        } else {
            info!(
                event_type = %event.event_type(),
                node = %event.node_id,
                state = %event.state,
                loaded = event.loaded_count,
                duration_ms = event.duration_ms,
                "Event: {}", event.event_type()
            );
        }
    }

    /// Logs a stage event.
    pub fn on_stage_event(&self, event: &StageEvent) {
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.event_type(),
                stage = %event.stage_id,
                node = ?event.node_id,
                progress = event.progress,
                "Event: {}", event.event_type()
            );
        } else {
            info!(
                event_type = %event.event_type(),
                stage = %event.stage_id,
                node = ?event.node_id,
                progress = event.progress,
                "Event: {}", event.event_type()
            );
        }
    }
}

/// A listener that records every event, for tests and status commands.
#[derive(Debug, Default)]
pub struct CollectingListener {
    node_events: RwLock<Vec<NodeEvent>>,
    stage_events: RwLock<Vec<StageEvent>>,
}

impl CollectingListener {
    /// Creates a new collecting listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector subscribed to both event streams of `store`.
    #[must_use]
    pub fn attach(store: &Store) -> Arc<Self> {
        let collector = Arc::new(Self::new());
        let nodes = Arc::clone(&collector);
        store.subscribe(move |event| nodes.record_node(event));
        let stages = Arc::clone(&collector);
        store.subscribe_stages(move |event| stages.record_stage(event));
        collector
    }

    /// Records a node event.
    pub fn record_node(&self, event: &NodeEvent) {
        self.node_events.write().push(event.clone());
    }

    /// Records a stage event.
    pub fn record_stage(&self, event: &StageEvent) {
        self.stage_events.write().push(event.clone());
    }

    /// Returns all recorded node events.
    #[must_use]
    pub fn node_events(&self) -> Vec<NodeEvent> {
        self.node_events.read().clone()
    }

    /// Returns all recorded stage events.
    #[must_use]
    pub fn stage_events(&self) -> Vec<StageEvent> {
        self.stage_events.read().clone()
    }

    /// Returns `(event_type, node_id)` pairs in delivery order.
    #[must_use]
    pub fn node_trace(&self) -> Vec<(String, String)> {
        self.node_events
            .read()
            .iter()
            .map(|e| (e.event_type().to_string(), e.node_id.clone()))
            .collect()
    }

    /// Returns `(event_type, stage_id)` pairs in delivery order.
    #[must_use]
    pub fn stage_trace(&self) -> Vec<(String, String)> {
        self.stage_events
            .read()
            .iter()
            .map(|e| (e.event_type().to_string(), e.stage_id.clone()))
            .collect()
    }

    /// Returns the node events of one kind.
    #[must_use]
    pub fn node_events_of(&self, kind: NodeEventKind) -> Vec<NodeEvent> {
        self.node_events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the kinds of events recorded for one node, in order.
    #[must_use]
    pub fn kinds_for(&self, node_id: &str) -> Vec<NodeEventKind> {
        self.node_events
            .read()
            .iter()
            .filter(|e| e.node_id == node_id)
            .map(|e| e.kind)
            .collect()
    }

    /// Returns the total number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_events.read().len() + self.stage_events.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.node_events.write().clear();
        self.stage_events.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LoadError, LoadErrorKind, NodeState, StageEventKind, StageState};

    #[test]
    fn test_logging_listener_does_not_panic() {
        let listener = LoggingListener::debug();
        listener.on_node_event(&NodeEvent::new(
            NodeEventKind::Started,
            "a",
            "A",
            NodeState::Running,
        ));
        let mut failed = NodeEvent::new(NodeEventKind::Failed, "a", "A", NodeState::Failed);
        failed.error = Some(LoadError::new(LoadErrorKind::Failed, "x"));
        LoggingListener::default().on_node_event(&failed);
        listener.on_stage_event(&StageEvent::new(
            StageEventKind::StageStarted,
            "core",
            "Core",
            StageState::Running,
        ));
    }

    #[test]
    fn test_collecting_listener_records_in_order() {
        let collector = CollectingListener::new();
        assert!(collector.is_empty());

        let started = |id: &str| NodeEvent::new(NodeEventKind::Started, id, id, NodeState::Running);
        collector.record_node(&started("a"));
        collector.record_node(&NodeEvent::new(
            NodeEventKind::Completed,
            "a",
            "a",
            NodeState::Complete,
        ));
        collector.record_node(&started("b"));
        collector.record_stage(&StageEvent::new(
            StageEventKind::StageStarted,
            "core",
            "Core",
            StageState::Running,
        ));

        assert_eq!(collector.len(), 4);
        assert_eq!(
            collector.kinds_for("a"),
            vec![NodeEventKind::Started, NodeEventKind::Completed]
        );
        assert_eq!(collector.node_events_of(NodeEventKind::Started).len(), 2);
        assert_eq!(collector.node_trace()[2], ("node.started".to_string(), "b".to_string()));
        assert_eq!(
            collector.stage_trace(),
            vec![("stage.started".to_string(), "core".to_string())]
        );

        collector.clear();
        assert!(collector.is_empty());
    }
}
