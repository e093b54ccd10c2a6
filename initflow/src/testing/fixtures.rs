//! Test fixtures.

use crate::config::OrchestratorConfig;
use crate::events::CollectingListener;
use crate::node::Node;
use crate::observability::CollectingDiagnostics;
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// An orchestrator wired to collecting diagnostics and events.
#[derive(Debug)]
pub struct TestHarness {
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    /// Every diagnostic the store emitted.
    pub diagnostics: Arc<CollectingDiagnostics>,
    /// Every event the store fired.
    pub events: Arc<CollectingListener>,
}

impl TestHarness {
    /// Creates a harness with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::new().with_name("test"))
    }

    /// Creates a harness with the given configuration.
    #[must_use]
    pub fn with_config(config: OrchestratorConfig) -> Self {
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let store = Arc::new(Store::with_diagnostics(config.name.clone(), diagnostics.clone()));
        let events = CollectingListener::attach(&store);
        Self {
            orchestrator: Orchestrator::with_store(store, config),
            diagnostics,
            events,
        }
    }

    /// Creates a harness with a chain of `count` nodes, each depending on
    /// the previous one (`n0 <- n1 <- ...`).
    #[must_use]
    pub fn linear(count: usize) -> Self {
        let harness = Self::new();
        for i in 0..count {
            let mut node = Node::new(format!("n{i}"), format!("Node {i}"), || Ok(1));
            if i > 0 {
                node = node.depends_on(format!("n{}", i - 1));
            }
            let _ = harness.orchestrator.add_node(node);
        }
        harness
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        self.orchestrator.store()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
