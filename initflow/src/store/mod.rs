//! The store: registry of nodes and stages, result cache and event bus.
//!
//! A store is the single source of truth for one initialization domain.
//! The orchestrator is its only writer; any number of observers may read it
//! or subscribe to its events, from any thread.

use crate::core::{LoadResult, LoadSummary, NodeEvent, NodeState, StageEvent};
use crate::errors::RegistrationError;
use crate::events::{ListenerList, Subscription};
use crate::node::{Node, NodeSnapshot};
use crate::observability::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingDiagnostics};
use crate::stage::Stage;
use crate::utils::{elapsed_ms, generate_run_id, is_valid_id, now_utc, Timestamp};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Id-indexed entries that remember registration order.
struct Registry<T> {
    by_id: HashMap<String, Arc<T>>,
    order: Vec<String>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    fn insert(&mut self, id: String, value: Arc<T>) {
        self.order.push(id.clone());
        self.by_id.insert(id, value);
    }

    fn get(&self, id: &str) -> Option<Arc<T>> {
        self.by_id.get(id).cloned()
    }

    fn ordered(&self) -> Vec<Arc<T>> {
        self.order.iter().filter_map(|id| self.get(id)).collect()
    }
}

/// Registry and single source of truth for one initialization domain.
pub struct Store {
    name: String,
    run_id: Uuid,
    nodes: RwLock<Registry<Node>>,
    stages: RwLock<Registry<Stage>>,
    root_stages: RwLock<Vec<String>>,
    node_stage: RwLock<HashMap<String, String>>,
    results: RwLock<HashMap<String, LoadResult>>,
    node_listeners: Arc<ListenerList<NodeEvent>>,
    stage_listeners: Arc<ListenerList<StageEvent>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    started_at: RwLock<Option<Timestamp>>,
    finished_at: RwLock<Option<Timestamp>>,
}

impl Store {
    /// Creates a store that logs diagnostics through `tracing`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let diagnostics = Arc::new(TracingDiagnostics::for_domain(name.clone()));
        Self::with_diagnostics(name, diagnostics)
    }

    /// Creates a store with an injected diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(name: impl Into<String>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            name: name.into(),
            run_id: generate_run_id(),
            nodes: RwLock::new(Registry::default()),
            stages: RwLock::new(Registry::default()),
            root_stages: RwLock::new(Vec::new()),
            node_stage: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            node_listeners: Arc::new(ListenerList::new()),
            stage_listeners: Arc::new(ListenerList::new()),
            diagnostics,
            started_at: RwLock::new(None),
            finished_at: RwLock::new(None),
        }
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id correlating this store's events and diagnostics.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Hands a diagnostic to the injected sink.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.emit(&diagnostic);
    }

    // ----------------------------------------------------------------
    // Registration
    // ----------------------------------------------------------------

    /// Registers a node.
    ///
    /// The first node registered under an id wins; later duplicates and
    /// malformed ids are rejected with a warning.
    pub fn register(&self, node: Node) -> Result<Arc<Node>, RegistrationError> {
        let node = Arc::new(node);
        self.register_shared(Arc::clone(&node))?;
        Ok(node)
    }

    /// Registers an already shared node.
    pub fn register_shared(&self, node: Arc<Node>) -> Result<(), RegistrationError> {
        let id = node.id().to_string();
        if !is_valid_id(&id) {
            return Err(self.reject(RegistrationError::InvalidId(id), DiagnosticKind::InvalidId));
        }

        let mut nodes = self.nodes.write();
        if nodes.contains(&id) {
            drop(nodes);
            return Err(self.reject(
                RegistrationError::DuplicateNode(id),
                DiagnosticKind::DuplicateNode,
            ));
        }
        nodes.insert(id.clone(), node);
        drop(nodes);

        self.emit(
            Diagnostic::debug(DiagnosticKind::Lifecycle, format!("Registered node '{id}'"))
                .with_subject(id),
        );
        Ok(())
    }

    /// Checks that a stage tree can be registered: every stage id is well
    /// formed and not yet taken, neither in the store nor within the tree.
    pub fn check_stage(&self, stage: &Stage) -> Result<(), RegistrationError> {
        let mut seen = HashSet::new();
        let stages = self.stages.read();
        let mut pending: Vec<&Stage> = vec![stage];
        while let Some(current) = pending.pop() {
            let id = current.id();
            if !is_valid_id(id) {
                drop(stages);
                return Err(self.reject(
                    RegistrationError::InvalidId(id.to_string()),
                    DiagnosticKind::InvalidId,
                ));
            }
            if stages.contains(id) || !seen.insert(id.to_string()) {
                drop(stages);
                return Err(self.reject(
                    RegistrationError::DuplicateStage(id.to_string()),
                    DiagnosticKind::DuplicateStage,
                ));
            }
            pending.extend(current.sub_stages().iter().map(|s| &**s));
        }
        Ok(())
    }

    /// Registers a stage tree. Its nodes must already be registered.
    pub fn register_stage(&self, stage: Arc<Stage>) -> Result<(), RegistrationError> {
        self.check_stage(&stage)?;

        let mut tree = vec![Arc::clone(&stage)];
        tree.extend(stage.descendants());

        let mut stages = self.stages.write();
        let mut node_stage = self.node_stage.write();
        for s in &tree {
            for node in s.nodes() {
                node_stage.insert(node.id().to_string(), s.id().to_string());
            }
            stages.insert(s.id().to_string(), Arc::clone(s));
        }
        drop(node_stage);
        drop(stages);
        self.root_stages.write().push(stage.id().to_string());

        self.emit(
            Diagnostic::debug(
                DiagnosticKind::Lifecycle,
                format!(
                    "Registered stage '{}' with {} nodes",
                    stage.id(),
                    stage.total_node_count()
                ),
            )
            .with_subject(stage.id()),
        );
        Ok(())
    }

    fn reject(&self, error: RegistrationError, kind: DiagnosticKind) -> RegistrationError {
        self.emit(Diagnostic::warn(kind, error.to_string()).with_subject(error.id()));
        error
    }

    // ----------------------------------------------------------------
    // Lookup
    // ----------------------------------------------------------------

    /// Returns the node registered under `id`.
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.read().get(id)
    }

    /// Returns true if a node is registered under `id`.
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.read().contains(id)
    }

    /// Returns all nodes in registration order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().ordered()
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().order.len()
    }

    /// Returns the stage registered under `id`, at any nesting depth.
    #[must_use]
    pub fn get_stage(&self, id: &str) -> Option<Arc<Stage>> {
        self.stages.read().get(id)
    }

    /// Returns every registered stage (nested ones included) in
    /// registration order.
    #[must_use]
    pub fn stages(&self) -> Vec<Arc<Stage>> {
        self.stages.read().ordered()
    }

    /// Returns the top-level stages in registration order.
    #[must_use]
    pub fn root_stages(&self) -> Vec<Arc<Stage>> {
        let stages = self.stages.read();
        self.root_stages
            .read()
            .iter()
            .filter_map(|id| stages.get(id))
            .collect()
    }

    /// Returns true if any stage was registered.
    #[must_use]
    pub fn has_stages(&self) -> bool {
        !self.root_stages.read().is_empty()
    }

    /// Returns the innermost stage containing the node.
    #[must_use]
    pub fn stage_of(&self, node_id: &str) -> Option<Arc<Stage>> {
        let stage_id = self.node_stage.read().get(node_id).cloned()?;
        self.get_stage(&stage_id)
    }

    /// Returns the current state of a node; unknown ids report Pending.
    #[must_use]
    pub fn get_state(&self, id: &str) -> NodeState {
        self.get_node(id).map_or(NodeState::Pending, |n| n.state())
    }

    /// Returns true if the node exists and is Complete.
    #[must_use]
    pub fn is_complete(&self, id: &str) -> bool {
        self.get_state(id) == NodeState::Complete
    }

    /// Returns true if the node exists and is Failed.
    #[must_use]
    pub fn is_failed(&self, id: &str) -> bool {
        self.get_state(id) == NodeState::Failed
    }

    // ----------------------------------------------------------------
    // Results
    // ----------------------------------------------------------------

    /// Stores `result` as the latest result of its node.
    pub fn record_result(&self, result: LoadResult) {
        self.results.write().insert(result.node_id.clone(), result);
    }

    /// Returns the latest recorded result of a node.
    #[must_use]
    pub fn get_result(&self, id: &str) -> Option<LoadResult> {
        self.results.read().get(id).cloned()
    }

    /// Forgets the recorded result of one node, returning it.
    pub fn forget_result(&self, id: &str) -> Option<LoadResult> {
        self.results.write().remove(id)
    }

    /// Returns all recorded results.
    #[must_use]
    pub fn results(&self) -> HashMap<String, LoadResult> {
        self.results.read().clone()
    }

    /// Forgets all recorded results and run timestamps.
    pub fn clear_results(&self) {
        self.results.write().clear();
        *self.started_at.write() = None;
        *self.finished_at.write() = None;
    }

    /// Records the start of the first pass. Later calls keep the first time.
    pub fn mark_started(&self) {
        self.started_at.write().get_or_insert_with(now_utc);
    }

    /// Records the end of the latest pass.
    pub fn mark_finished(&self) {
        *self.finished_at.write() = Some(now_utc());
    }

    /// Aggregates node states and recorded results.
    #[must_use]
    pub fn get_summary(&self) -> LoadSummary {
        let mut summary = LoadSummary::new();
        let results = self.results.read();
        for node in self.nodes() {
            let error = results
                .get(node.id())
                .and_then(|r| r.error.clone())
                .or_else(|| node.last_error());
            summary.record(
                node.id(),
                node.display_name(),
                node.state(),
                node.loaded_count(),
                error.as_ref(),
            );
        }
        drop(results);

        summary.started_at = *self.started_at.read();
        summary.finished_at = *self.finished_at.read();
        if let (Some(start), Some(end)) = (&summary.started_at, &summary.finished_at) {
            summary.duration_ms = elapsed_ms(start, end);
        }
        summary
    }

    // ----------------------------------------------------------------
    // Events
    // ----------------------------------------------------------------

    /// Subscribes to every node event.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        self.node_listeners.add(listener, None)
    }

    /// Subscribes to node events of the given node ids only.
    pub fn subscribe_filtered<F, I, S>(&self, listener: F, ids: I) -> Subscription
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = ids.into_iter().map(Into::into).collect();
        self.node_listeners.add(listener, Some(filter))
    }

    /// Subscribes to every stage event.
    pub fn subscribe_stages<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.stage_listeners.add(listener, None)
    }

    /// Subscribes to stage events of the given stage ids only.
    pub fn subscribe_stages_filtered<F, I, S>(&self, listener: F, ids: I) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = ids.into_iter().map(Into::into).collect();
        self.stage_listeners.add(listener, Some(filter))
    }

    /// Returns the number of node and stage listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.node_listeners.len() + self.stage_listeners.len()
    }

    /// Delivers a node event to its subscribers.
    pub fn fire_event(&self, event: &NodeEvent) {
        for message in self.node_listeners.dispatch(event) {
            self.emit(
                Diagnostic::error(
                    DiagnosticKind::ListenerPanicked,
                    format!("Listener panicked on {}: {message}", event.event_type()),
                )
                .with_subject(event.node_id.clone()),
            );
        }
    }

    /// Delivers a stage event to its subscribers.
    pub fn fire_stage_event(&self, event: &StageEvent) {
        for message in self.stage_listeners.dispatch(event) {
            self.emit(
                Diagnostic::error(
                    DiagnosticKind::ListenerPanicked,
                    format!("Listener panicked on {}: {message}", event.event_type()),
                )
                .with_subject(event.stage_id.clone()),
            );
        }
    }

    // ----------------------------------------------------------------
    // Persistence support
    // ----------------------------------------------------------------

    /// Captures the derived state of every node, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes().iter().map(|n| n.snapshot()).collect()
    }

    /// Restores node state from snapshots. Unknown ids are ignored.
    ///
    /// Returns the number of nodes restored.
    pub fn restore(&self, snapshots: &[NodeSnapshot]) -> usize {
        snapshots
            .iter()
            .filter(|snap| {
                let restored = self.get_node(&snap.id).is_some_and(|n| n.restore(snap));
                if !restored {
                    self.emit(
                        Diagnostic::debug(
                            DiagnosticKind::Lifecycle,
                            format!("Snapshot for unknown node '{}' ignored", snap.id),
                        )
                        .with_subject(snap.id.clone()),
                    );
                }
                restored
            })
            .count()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .field("nodes", &self.node_count())
            .field("stages", &self.stages.read().order.len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
