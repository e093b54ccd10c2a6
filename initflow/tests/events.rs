//! Event delivery and listener management.

use initflow::prelude::*;
use initflow::testing::TestHarness;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn started_precedes_outcome_for_every_node() {
    let h = TestHarness::linear(3);
    h.orchestrator.execute();

    for i in 0..3 {
        assert_eq!(
            h.events.kinds_for(&format!("n{i}")),
            vec![NodeEventKind::Started, NodeEventKind::Completed]
        );
    }
}

#[test]
fn panicking_listener_does_not_stop_delivery() {
    let h = TestHarness::linear(2);
    h.store().subscribe(|_| panic!("listener bug"));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    h.store().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let summary = h.orchestrator.execute();

    assert!(summary.all_succeeded());
    assert_eq!(delivered.load(Ordering::SeqCst), 4);
    assert_eq!(h.diagnostics.of_kind(DiagnosticKind::ListenerPanicked).len(), 4);
}

#[test]
fn cancelled_subscription_stops_receiving() {
    let h = TestHarness::linear(2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = h.store().subscribe(move |event| sink.lock().push(event.node_id.clone()));
    assert!(subscription.is_active());

    h.orchestrator.execute_node("n0");
    assert!(subscription.cancel());
    assert!(!subscription.cancel());
    h.orchestrator.execute_node("n1");

    assert_eq!(*seen.lock(), vec!["n0".to_string(), "n0".to_string()]);
}

#[test]
fn listeners_can_be_added_from_other_threads_during_execution() {
    let h = TestHarness::new();
    for i in 0..50 {
        h.orchestrator
            .add_node(Node::new(format!("n{i}"), "N", || {
                thread::yield_now();
                Ok(1)
            }))
            .unwrap();
    }
    let store = Arc::clone(h.store());

    let adder = thread::spawn(move || {
        for _ in 0..50 {
            let subscription = store.subscribe(|_| {});
            subscription.cancel();
        }
    });
    let summary = h.orchestrator.execute();
    adder.join().unwrap();

    assert_eq!(summary.completed, 50);
    // Only the harness collector remains subscribed to node events.
    assert_eq!(h.store().listener_count(), 2);
}

#[test]
fn observer_thread_reads_state_while_running() {
    let h = TestHarness::linear(20);
    let store = Arc::clone(h.store());
    let observer = thread::spawn(move || {
        let mut last = 0;
        for _ in 0..100 {
            let completed = store
                .nodes()
                .iter()
                .filter(|n| n.state() == NodeState::Complete)
                .count();
            assert!(completed >= last);
            last = completed;
            thread::yield_now();
        }
    });

    h.orchestrator.execute();
    observer.join().unwrap();
    assert_eq!(h.orchestrator.summary().completed, 20);
}

#[test]
fn events_serialize_with_dotted_type() {
    let h = TestHarness::linear(1);
    h.orchestrator.execute();
    let event = &h.events.node_events()[1];

    let json = serde_json::to_value(event).unwrap();

    assert_eq!(event.event_type(), "node.completed");
    assert_eq!(json["node_id"], "n0");
    assert_eq!(json["loaded_count"], 1);
}

#[test]
fn logging_listener_attaches_through_config() {
    let config = OrchestratorConfig::new()
        .with_name("logged")
        .with_event_log_level(tracing::Level::DEBUG);
    let h = TestHarness::with_config(config);
    h.orchestrator
        .add_node(Node::new("a", "A", || Ok(1)))
        .unwrap();

    h.orchestrator.execute();

    // Collector and logger, each on both streams.
    assert_eq!(h.store().listener_count(), 4);
}
