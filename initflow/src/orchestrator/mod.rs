//! The orchestrator: ordering, execution, staged runs and reloads.
//!
//! An [`Orchestrator`] owns one [`Store`] and drives every node registered
//! with it. Drivers run synchronously on the calling thread and are
//! serialized by a re-entrant lock, so an event listener may call back into
//! [`Orchestrator::reload`] while a pass is in progress.

mod graph;
mod handles;

pub use graph::{topological_order, transitive_dependents, Edge, ExecutionPlan};
pub use handles::{NodeHandle, StageHandle};

use crate::config::OrchestratorConfig;
use crate::core::{
    FailureRecord, LoadResult, LoadSummary, NodeEvent, NodeEventKind, NodeState, ReloadSummary,
    StageEventKind, StageState,
};
use crate::errors::RegistrationError;
use crate::events::LoggingListener;
use crate::node::Node;
use crate::observability::{Diagnostic, DiagnosticKind};
use crate::stage::Stage;
use crate::store::Store;
use parking_lot::{ReentrantMutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Dependency-ordered initialization driver.
pub struct Orchestrator {
    store: Arc<Store>,
    config: OrchestratorConfig,
    executed: AtomicBool,
    severed: RwLock<HashSet<Edge>>,
    run_lock: ReentrantMutex<()>,
}

impl Orchestrator {
    /// Creates an orchestrator with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(OrchestratorConfig::new().with_name(name))
    }

    /// Creates an orchestrator with its own store.
    #[must_use]
    pub fn with_config(config: OrchestratorConfig) -> Self {
        let store = Arc::new(Store::new(config.name.clone()));
        Self::with_store(store, config)
    }

    /// Creates an orchestrator over an existing store.
    #[must_use]
    pub fn with_store(store: Arc<Store>, config: OrchestratorConfig) -> Self {
        match config.event_level() {
            Ok(Some(level)) => LoggingListener::new(level).attach(&store),
            Ok(None) => {}
            Err(err) => store.emit(Diagnostic::warn(DiagnosticKind::Lifecycle, err.to_string())),
        }
        Self {
            store,
            config,
            executed: AtomicBool::new(false),
            severed: RwLock::new(HashSet::new()),
            run_lock: ReentrantMutex::new(()),
        }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns true once `execute` has run.
    #[must_use]
    pub fn has_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    // ----------------------------------------------------------------
    // Registration
    // ----------------------------------------------------------------

    /// Registers a node outside any stage.
    pub fn add_node(&self, node: Node) -> Result<Arc<Node>, RegistrationError> {
        self.store.register(node)
    }

    /// Registers a stage tree and all of its nodes.
    ///
    /// Nodes rejected by the store (duplicate or malformed ids) are dropped
    /// from the stage; the rest of the stage is kept.
    pub fn add_stage(&self, mut stage: Stage) -> Result<Arc<Stage>, RegistrationError> {
        self.store.check_stage(&stage)?;

        let store = &self.store;
        let shared = stage
            .retain_nodes(&mut |node: &Arc<Node>| store.register_shared(Arc::clone(node)).is_ok());
        let stage = Arc::new(stage);

        for sub in stage.descendants().iter().filter(|s| shared.iter().any(|id| id == s.id())) {
            store.emit(
                Diagnostic::warn(
                    DiagnosticKind::Lifecycle,
                    format!(
                        "Sub-stage '{}' is shared; registering its nodes as they are",
                        sub.id()
                    ),
                )
                .with_subject(sub.id()),
            );
            for node in sub.all_nodes() {
                // Duplicates are already reported by the store.
                let _ = store.register_shared(node);
            }
        }

        store.register_stage(Arc::clone(&stage))?;
        Ok(stage)
    }

    // ----------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------

    /// Returns a handle to a registered node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<NodeHandle<'_>> {
        self.store.get_node(id).map(|node| NodeHandle::new(self, node))
    }

    /// Returns a handle to a registered stage.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<StageHandle<'_>> {
        self.store.get_stage(id).map(|stage| StageHandle::new(self, stage))
    }

    /// Returns the current summary.
    #[must_use]
    pub fn summary(&self) -> LoadSummary {
        self.store.get_summary()
    }

    /// Orders every registered node without running anything.
    #[must_use]
    pub fn plan(&self) -> ExecutionPlan {
        topological_order(&self.store.nodes(), &self.store)
    }

    // ----------------------------------------------------------------
    // Execution
    // ----------------------------------------------------------------

    /// Runs every node once, in dependency order.
    ///
    /// With stages registered, stages run in registration order; otherwise
    /// all nodes are sorted globally. Only the first call runs anything;
    /// later calls log a warning and return the current summary.
    pub fn execute(&self) -> LoadSummary {
        let _run = self.run_lock.lock();
        if self.executed.swap(true, Ordering::SeqCst) {
            self.store.emit(Diagnostic::warn(
                DiagnosticKind::AlreadyExecuted,
                "execute() already ran; use resume() or reload() instead",
            ));
            return self.summary();
        }
        self.run_pass("Initialization")
    }

    /// Runs the same pass as `execute` again, skipping finished nodes.
    ///
    /// Pending and Stale nodes whose dependencies are now complete are run;
    /// this picks up nodes left behind by a failed reload cascade.
    pub fn resume(&self) -> LoadSummary {
        let _run = self.run_lock.lock();
        self.executed.store(true, Ordering::SeqCst);
        self.run_pass("Resume")
    }

    /// Runs a single node if it is runnable and its dependencies are
    /// complete. Returns `None` when the node is unknown or was skipped.
    pub fn execute_node(&self, id: &str) -> Option<LoadResult> {
        let _run = self.run_lock.lock();
        let Some(node) = self.store.get_node(id) else {
            self.store.emit(
                Diagnostic::warn(DiagnosticKind::MissingDependency, format!("Unknown node '{id}'"))
                    .with_subject(id),
            );
            return None;
        };
        self.run_node(&node)
    }

    /// Returns every node and stage to Pending and forgets all results.
    pub fn reset(&self) {
        let _run = self.run_lock.lock();
        for stage in self.store.root_stages() {
            stage.reset();
        }
        for node in self.store.nodes() {
            node.reset_to_pending();
        }
        self.store.clear_results();
        self.severed.write().clear();
        self.executed.store(false, Ordering::SeqCst);
        self.store
            .emit(Diagnostic::debug(DiagnosticKind::Lifecycle, "Orchestrator reset"));
    }

    /// Returns one node to Pending and forgets its recorded result.
    ///
    /// Returns `false` for an unknown id. Dependents keep their state.
    pub fn reset_node(&self, id: &str) -> bool {
        let _run = self.run_lock.lock();
        let Some(node) = self.store.get_node(id) else {
            return false;
        };
        node.reset_to_pending();
        self.store.forget_result(id);
        self.store
            .emit(Diagnostic::debug(DiagnosticKind::Lifecycle, format!("Node '{id}' reset")));
        true
    }

    fn run_pass(&self, label: &str) -> LoadSummary {
        self.store.mark_started();
        self.store.emit(Diagnostic::info(
            DiagnosticKind::Lifecycle,
            format!("{label} started for {} nodes", self.store.node_count()),
        ));

        if self.store.has_stages() {
            self.run_staged();
        } else {
            for node in self.order(&self.store.nodes()) {
                self.run_node(&node);
            }
        }

        self.store.mark_finished();
        let summary = self.summary();
        let diagnostic = if summary.has_failures() {
            Diagnostic::warn(DiagnosticKind::Lifecycle, format!("{label} finished: {summary}"))
        } else {
            Diagnostic::info(DiagnosticKind::Lifecycle, format!("{label} finished: {summary}"))
        };
        self.store.emit(diagnostic);
        summary
    }

    fn run_staged(&self) {
        if self.config.warn_unstaged_nodes {
            let unstaged: Vec<String> = self
                .store
                .nodes()
                .iter()
                .filter(|n| self.store.stage_of(n.id()).is_none())
                .map(|n| n.id().to_string())
                .collect();
            if !unstaged.is_empty() {
                self.store.emit(Diagnostic::warn(
                    DiagnosticKind::UnstagedNodes,
                    format!(
                        "{} node(s) outside any stage will not run: {}",
                        unstaged.len(),
                        unstaged.join(", ")
                    ),
                ));
            }
        }

        for stage in self.store.root_stages() {
            if stage.state().is_terminal() && !stage.has_runnable_nodes() {
                continue;
            }
            self.run_stage(&stage);
        }
    }

    fn run_stage(&self, stage: &Arc<Stage>) {
        let unmet: Vec<&str> = stage
            .stage_dependencies()
            .iter()
            .filter(|dep| {
                self.store
                    .get_stage(dep)
                    .map_or(true, |s| s.state() != StageState::Complete)
            })
            .map(String::as_str)
            .collect();
        if !unmet.is_empty() {
            self.store.emit(
                Diagnostic::warn(
                    DiagnosticKind::StageSkipped,
                    format!(
                        "Skipping stage '{}': stage dependencies not complete: {}",
                        stage.id(),
                        unmet.join(", ")
                    ),
                )
                .with_subject(stage.id()),
            );
            return;
        }

        let mut tree = vec![Arc::clone(stage)];
        tree.extend(stage.descendants());
        for s in &tree {
            s.begin();
            self.store.fire_stage_event(&s.event(StageEventKind::StageStarted));
        }

        for node in self.order(&stage.all_nodes()) {
            self.run_node(&node);
        }

        for s in tree.iter().rev() {
            let kind = match s.finish() {
                StageState::Failed => StageEventKind::StageFailed,
                _ => StageEventKind::StageComplete,
            };
            self.store.fire_stage_event(&s.event(kind));
        }
        self.store.emit(
            Diagnostic::debug(
                DiagnosticKind::Lifecycle,
                format!("Stage '{}' finished as {}", stage.id(), stage.state()),
            )
            .with_subject(stage.id()),
        );
    }

    fn run_node(&self, node: &Arc<Node>) -> Option<LoadResult> {
        if !node.state().is_runnable() || !self.dependencies_ready(node) {
            return None;
        }

        self.store.fire_event(&NodeEvent::new(
            NodeEventKind::Started,
            node.id(),
            node.display_name(),
            NodeState::Running,
        ));
        let result = node.execute();
        self.store.record_result(result.clone());

        let kind = if result.is_success() {
            NodeEventKind::Completed
        } else {
            self.report_failure(DiagnosticKind::LoadFailed, &result);
            NodeEventKind::Failed
        };
        self.store.fire_event(&NodeEvent::from_result(kind, &result));

        if let Some(stage) = self.store.stage_of(node.id()) {
            stage.record_node(result.state);
            let kind = if result.is_success() {
                StageEventKind::NodeComplete
            } else {
                StageEventKind::NodeFailed
            };
            self.store
                .fire_stage_event(&stage.event(kind).with_node(node.id()));
        }
        Some(result)
    }

    fn dependencies_ready(&self, node: &Node) -> bool {
        let severed = self.severed.read();
        let blocked = node.dependencies().iter().find(|dep| {
            let exempt = self.config.break_cycles
                && severed.contains(&(node.id().to_string(), (*dep).clone()));
            !exempt && !self.store.is_complete(dep)
        });
        drop(severed);

        let Some(dep) = blocked else {
            return true;
        };
        self.store.emit(
            Diagnostic::warn(
                DiagnosticKind::DependencyNotReady,
                format!(
                    "Skipping '{}': dependency '{dep}' is {}",
                    node.id(),
                    self.store.get_state(dep)
                ),
            )
            .with_subject(node.id()),
        );
        false
    }

    fn order(&self, nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
        let plan = topological_order(nodes, &self.store);
        self.severed.write().extend(plan.severed);
        plan.order
    }

    fn report_failure(&self, kind: DiagnosticKind, result: &LoadResult) {
        let message = result.error_message().unwrap_or("unknown error");
        self.store.emit(
            Diagnostic::error(kind, format!("{} failed: {message}", result.display_name))
                .with_subject(result.node_id.clone()),
        );
    }

    // ----------------------------------------------------------------
    // Reload
    // ----------------------------------------------------------------

    /// Reloads a node and, on success, its Stale dependents.
    ///
    /// Complete dependents are marked Stale first. Returns whether the
    /// requested node reloaded successfully; unknown and non-reloadable
    /// ids return false without changing anything.
    pub fn reload(&self, id: &str) -> bool {
        let _run = self.run_lock.lock();
        let Some(node) = self.store.get_node(id) else {
            self.reject_reload(id, format!("Cannot reload unknown node '{id}'"));
            return false;
        };
        if !node.is_reloadable() {
            self.reject_reload(id, format!("Node '{id}' is not reloadable"));
            return false;
        }
        self.reload_node(&node)
    }

    /// Reloads every reloadable node once, in dependency order.
    ///
    /// No staleness is propagated and nothing cascades.
    pub fn reload_all(&self) -> ReloadSummary {
        let _run = self.run_lock.lock();
        let mut summary = ReloadSummary::default();
        for node in self.order(&self.store.nodes()) {
            if !node.is_reloadable() {
                summary.skipped += 1;
                continue;
            }
            let result = self.run_reload(&node);
            if result.is_success() {
                summary.reloaded += 1;
            } else {
                summary.failed += 1;
                summary.failures.push(FailureRecord::new(
                    &result.node_id,
                    &result.display_name,
                    result.error_message().unwrap_or("unknown error"),
                ));
            }
        }
        self.store.emit(Diagnostic::info(
            DiagnosticKind::Lifecycle,
            format!("Reload finished: {summary}"),
        ));
        summary
    }

    /// Marks a Complete or Failed node Stale and announces it.
    pub fn mark_stale(&self, id: &str) -> bool {
        let Some(node) = self.store.get_node(id) else {
            return false;
        };
        self.stale(&node)
    }

    fn reload_node(&self, node: &Arc<Node>) -> bool {
        let nodes = self.store.nodes();
        let direct = nodes
            .iter()
            .filter(|n| n.id() != node.id() && n.has_dependency(node.id()));
        for dependent in direct {
            if dependent.state() == NodeState::Complete {
                self.stale(dependent);
            }
        }

        if !self.run_reload(node).is_success() {
            return false;
        }
        if self.config.cascade_reloads {
            self.cascade(node.id(), &nodes);
        }
        true
    }

    /// Reloads the transitive dependents of `root` in dependency order.
    ///
    /// A Complete node turns Stale once one of its dependencies reloaded in
    /// this cascade. A Stale node reloads only if it is reloadable and all
    /// of its dependencies are Complete; otherwise it stays Stale. The first
    /// failed reload ends the cascade.
    fn cascade(&self, root: &str, nodes: &[Arc<Node>]) {
        let mut reloaded = HashSet::from([root.to_string()]);
        for dependent in self.order(&transitive_dependents(root, nodes)) {
            if dependent.state() == NodeState::Complete
                && dependent.dependencies().iter().any(|d| reloaded.contains(d))
            {
                self.stale(&dependent);
            }
            if dependent.state() != NodeState::Stale
                || !dependent.is_reloadable()
                || !self.dependencies_ready(&dependent)
            {
                continue;
            }
            if !self.run_reload(&dependent).is_success() {
                break;
            }
            reloaded.insert(dependent.id().to_string());
        }
    }

    fn run_reload(&self, node: &Node) -> LoadResult {
        self.store.fire_event(&NodeEvent::new(
            NodeEventKind::ReloadStarted,
            node.id(),
            node.display_name(),
            NodeState::Running,
        ));
        let result = node.execute_reload();
        self.store.record_result(result.clone());
        if result.is_success() {
            self.store
                .fire_event(&NodeEvent::from_result(NodeEventKind::ReloadCompleted, &result));
        } else {
            self.report_failure(DiagnosticKind::ReloadFailed, &result);
            self.store
                .fire_event(&NodeEvent::from_result(NodeEventKind::Failed, &result));
        }
        result
    }

    fn stale(&self, node: &Node) -> bool {
        if !node.mark_stale() {
            return false;
        }
        self.store.fire_event(&NodeEvent::new(
            NodeEventKind::Stale,
            node.id(),
            node.display_name(),
            NodeState::Stale,
        ));
        true
    }

    fn reject_reload(&self, id: &str, message: String) {
        self.store
            .emit(Diagnostic::warn(DiagnosticKind::ReloadRejected, message).with_subject(id));
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("executed", &self.has_executed())
            .finish_non_exhaustive()
    }
}
