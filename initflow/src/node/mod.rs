//! Nodes: named, idempotent units of load work.
//!
//! A node is data (id, display name, dependencies, reloadable flag) plus an
//! injected work closure. It owns its own small state machine:
//!
//! ```text
//! Pending -> Running -> Complete | Failed -> Stale -> Running -> ...
//! ```

mod hooks;
mod snapshot;

pub use hooks::LoadHooks;
#[cfg(test)]
pub use hooks::MockLoadHooks;
pub use snapshot::NodeSnapshot;

use crate::core::{LoadError, LoadResult, NodeState};
use crate::observability::SpanTimer;
use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A work closure: returns the number of items loaded, or an error.
pub type LoadFn = Box<dyn Fn() -> anyhow::Result<usize> + Send + Sync>;

/// Derived per-node state, guarded as one unit.
#[derive(Debug, Clone, Default)]
struct NodeStatus {
    state: NodeState,
    loaded_count: usize,
    duration_ms: f64,
    last_error: Option<LoadError>,
    last_result: Option<LoadResult>,
}

/// A named, idempotent, retryable unit of work with declared dependencies.
pub struct Node {
    id: String,
    display_name: String,
    dependencies: Vec<String>,
    reloadable: bool,
    loader: LoadFn,
    reloader: Option<LoadFn>,
    hooks: Option<Arc<dyn LoadHooks>>,
    status: RwLock<NodeStatus>,
}

impl Node {
    /// Creates a new node around a work closure.
    ///
    /// # Examples
    ///
    /// ```
    /// use initflow::node::Node;
    ///
    /// let node = Node::new("blocks", "Block Registry", || Ok(128))
    ///     .depends_on("materials")
    ///     .reloadable();
    /// assert_eq!(node.dependencies(), ["materials".to_string()]);
    /// ```
    pub fn new<F>(id: impl Into<String>, display_name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<usize> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            dependencies: Vec::new(),
            reloadable: false,
            loader: Box::new(loader),
            reloader: None,
            hooks: None,
            status: RwLock::new(NodeStatus::default()),
        }
    }

    /// Adds a dependency on another node id. Duplicates are ignored.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    /// Adds several dependencies.
    #[must_use]
    pub fn with_dependencies(self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ids.into_iter().fold(self, |node, id| node.depends_on(id))
    }

    /// Marks the node as reloadable.
    #[must_use]
    pub fn reloadable(mut self) -> Self {
        self.reloadable = true;
        self
    }

    /// Sets whether the node is reloadable.
    #[must_use]
    pub fn with_reloadable(mut self, reloadable: bool) -> Self {
        self.reloadable = reloadable;
        self
    }

    /// Sets a dedicated reload closure and marks the node reloadable.
    ///
    /// Without one, reloads run the load closure again.
    #[must_use]
    pub fn with_reloader<F>(mut self, reloader: F) -> Self
    where
        F: Fn() -> anyhow::Result<usize> + Send + Sync + 'static,
    {
        self.reloader = Some(Box::new(reloader));
        self.reloadable = true;
        self
    }

    /// Attaches lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn LoadHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Returns the node id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the declared dependency ids in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns true if `id` is one of the declared dependencies.
    #[must_use]
    pub fn has_dependency(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }

    /// Returns true if the node may be reloaded.
    #[must_use]
    pub fn is_reloadable(&self) -> bool {
        self.reloadable
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.status.read().state
    }

    /// Returns the item count of the last successful attempt.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.status.read().loaded_count
    }

    /// Returns the duration of the last attempt in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.status.read().duration_ms
    }

    /// Returns the last captured error.
    #[must_use]
    pub fn last_error(&self) -> Option<LoadError> {
        self.status.read().last_error.clone()
    }

    /// Returns the result of the last attempt, if any.
    #[must_use]
    pub fn last_result(&self) -> Option<LoadResult> {
        let status = self.status.read();
        status
            .last_result
            .clone()
            .or_else(|| status.state.is_terminal().then(|| self.synthesize_result(&status)))
    }

    /// Runs the work closure once per Pending/Stale cycle.
    ///
    /// A node already Complete or Failed is not run again; its cached result
    /// is returned. Errors and panics from the closure are captured into the
    /// result and never propagate.
    pub fn execute(&self) -> LoadResult {
        {
            let mut status = self.status.write();
            match status.state {
                NodeState::Complete | NodeState::Failed | NodeState::Running => {
                    return status
                        .last_result
                        .clone()
                        .unwrap_or_else(|| self.synthesize_result(&status));
                }
                NodeState::Pending | NodeState::Stale => status.state = NodeState::Running,
            }
        }
        self.run(&self.loader, false)
    }

    /// Re-runs the node regardless of its state.
    ///
    /// Non-reloadable nodes return a `NotReloadable` error result without
    /// running anything or changing state.
    pub fn execute_reload(&self) -> LoadResult {
        if !self.reloadable {
            return LoadResult::failed(
                &self.id,
                &self.display_name,
                LoadError::not_reloadable(&self.id),
                0.0,
            )
            .as_reload();
        }
        self.status.write().state = NodeState::Running;
        let work = self.reloader.as_ref().unwrap_or(&self.loader);
        self.run(work, true)
    }

    /// Marks a Complete or Failed node Stale, clearing its error.
    ///
    /// Returns whether the state changed.
    pub fn mark_stale(&self) -> bool {
        let mut status = self.status.write();
        if !status.state.is_terminal() {
            return false;
        }
        status.state = NodeState::Stale;
        status.last_error = None;
        true
    }

    /// Returns the node to Pending, clearing count, duration and error.
    pub fn reset_to_pending(&self) {
        *self.status.write() = NodeStatus::default();
    }

    /// Captures the node's derived state.
    #[must_use]
    pub fn snapshot(&self) -> NodeSnapshot {
        let status = self.status.read();
        NodeSnapshot {
            id: self.id.clone(),
            state: status.state,
            loaded_count: status.loaded_count,
            duration_ms: status.duration_ms,
            last_error: status.last_error.clone(),
        }
    }

    /// Restores derived state from a snapshot of the same node.
    ///
    /// A snapshot taken mid-run restores as Pending. Returns false and
    /// changes nothing when the snapshot belongs to a different id.
    pub fn restore(&self, snapshot: &NodeSnapshot) -> bool {
        if snapshot.id != self.id {
            return false;
        }
        let state = match snapshot.state {
            NodeState::Running => NodeState::Pending,
            other => other,
        };
        *self.status.write() = NodeStatus {
            state,
            loaded_count: snapshot.loaded_count,
            duration_ms: snapshot.duration_ms,
            last_error: snapshot.last_error.clone(),
            last_result: None,
        };
        true
    }

    fn run(&self, work: &LoadFn, reload: bool) -> LoadResult {
        let timer = SpanTimer::start(&self.id);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            if let Some(hooks) = &self.hooks {
                hooks.before_load(self);
            }
            let count = work()?;
            if let Some(hooks) = &self.hooks {
                hooks.after_load(self, count);
            }
            Ok::<usize, anyhow::Error>(count)
        }));
        let duration_ms = timer.finish();

        let result = match outcome {
            Ok(Ok(count)) => LoadResult::complete(&self.id, &self.display_name, count, duration_ms),
            Ok(Err(err)) => LoadResult::failed(
                &self.id,
                &self.display_name,
                LoadError::from_anyhow(&err),
                duration_ms,
            ),
            Err(payload) => LoadResult::failed(
                &self.id,
                &self.display_name,
                LoadError::from_panic(payload.as_ref()),
                duration_ms,
            ),
        };
        let result = if reload { result.as_reload() } else { result };

        {
            let mut status = self.status.write();
            status.state = result.state;
            status.duration_ms = duration_ms;
            status.last_error.clone_from(&result.error);
            if result.is_success() {
                status.loaded_count = result.loaded_count;
            }
            status.last_result = Some(result.clone());
        }

        if let (Some(error), Some(hooks)) = (&result.error, &self.hooks) {
            let _ = catch_unwind(AssertUnwindSafe(|| hooks.on_error(self, error)));
        }

        result
    }

    fn synthesize_result(&self, status: &NodeStatus) -> LoadResult {
        match &status.last_error {
            Some(error) => LoadResult::failed(
                &self.id,
                &self.display_name,
                error.clone(),
                status.duration_ms,
            ),
            None => {
                let mut result = LoadResult::complete(
                    &self.id,
                    &self.display_name,
                    status.loaded_count,
                    status.duration_ms,
                );
                result.state = status.state;
                result
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("dependencies", &self.dependencies)
            .field("reloadable", &self.reloadable)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
