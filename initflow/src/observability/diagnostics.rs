//! Diagnostic façade used by the store and orchestrator.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    /// Fine-grained progress.
    Debug,
    /// Normal lifecycle facts.
    Info,
    /// Something was skipped or rejected.
    Warn,
    /// Something is misconfigured or failed.
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A node id was registered twice.
    DuplicateNode,
    /// A stage id was registered twice.
    DuplicateStage,
    /// A node or stage id is malformed.
    InvalidId,
    /// A dependency id does not name a registered node.
    MissingDependency,
    /// A dependency cycle was found and an edge severed.
    CycleDetected,
    /// A node was skipped because a dependency is not complete.
    DependencyNotReady,
    /// A stage was skipped because a stage dependency is not complete.
    StageSkipped,
    /// Nodes outside any stage will not run in staged mode.
    UnstagedNodes,
    /// `execute` was called more than once.
    AlreadyExecuted,
    /// A node's work closure failed.
    LoadFailed,
    /// A reload was requested for an unknown or non-reloadable node.
    ReloadRejected,
    /// A reload attempt failed.
    ReloadFailed,
    /// An event listener panicked.
    ListenerPanicked,
    /// Lifecycle progress (run started, stage finished, ...).
    Lifecycle,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DuplicateNode => "duplicate_node",
            Self::DuplicateStage => "duplicate_stage",
            Self::InvalidId => "invalid_id",
            Self::MissingDependency => "missing_dependency",
            Self::CycleDetected => "cycle_detected",
            Self::DependencyNotReady => "dependency_not_ready",
            Self::StageSkipped => "stage_skipped",
            Self::UnstagedNodes => "unstaged_nodes",
            Self::AlreadyExecuted => "already_executed",
            Self::LoadFailed => "load_failed",
            Self::ReloadRejected => "reload_rejected",
            Self::ReloadFailed => "reload_failed",
            Self::ListenerPanicked => "listener_panicked",
            Self::Lifecycle => "lifecycle",
        };
        f.write_str(s)
    }
}

/// A structured, log-worthy fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub level: DiagnosticLevel,
    /// Category.
    pub kind: DiagnosticKind,
    /// The node or stage id the diagnostic is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(level: DiagnosticLevel, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            subject: None,
            message: message.into(),
        }
    }

    /// Creates a debug-level diagnostic.
    #[must_use]
    pub fn debug(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Debug, kind, message)
    }

    /// Creates an info-level diagnostic.
    #[must_use]
    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, kind, message)
    }

    /// Creates a warn-level diagnostic.
    #[must_use]
    pub fn warn(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, kind, message)
    }

    /// Creates an error-level diagnostic.
    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, kind, message)
    }

    /// Sets the subject id.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Receiver of diagnostics.
///
/// Implementations must not panic; the orchestrator does not guard calls
/// into the sink.
pub trait DiagnosticSink: Send + Sync {
    /// Handles one diagnostic.
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Discards all diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDiagnostics;

impl DiagnosticSink for NoOpDiagnostics {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

/// Forwards diagnostics to the `tracing` framework.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics {
    /// Label attached to every record, usually the store name.
    domain: Option<String>,
}

impl TracingDiagnostics {
    /// Creates a sink that tags every record with `domain`.
    #[must_use]
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
        }
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn emit(&self, d: &Diagnostic) {
        let domain = self.domain.as_deref().unwrap_or("");
        let subject = d.subject.as_deref().unwrap_or("");
        match d.level {
            DiagnosticLevel::Debug => {
                tracing::debug!(domain, kind = %d.kind, subject, "{}", d.message);
            }
            DiagnosticLevel::Info => {
                tracing::info!(domain, kind = %d.kind, subject, "{}", d.message);
            }
            DiagnosticLevel::Warn => {
                tracing::warn!(domain, kind = %d.kind, subject, "{}", d.message);
            }
            DiagnosticLevel::Error => {
                tracing::error!(domain, kind = %d.kind, subject, "{}", d.message);
            }
        }
    }
}

/// Records diagnostics in memory, for tests and status screens.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    records: RwLock<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected diagnostics.
    #[must_use]
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.read().clone()
    }

    /// Returns diagnostics of the given kind.
    #[must_use]
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.records
            .read()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns diagnostics at or above the given level.
    #[must_use]
    pub fn at_least(&self, level: DiagnosticLevel) -> Vec<Diagnostic> {
        self.records
            .read()
            .iter()
            .filter(|d| d.level >= level)
            .cloned()
            .collect()
    }

    /// Returns true if a diagnostic of `kind` mentioning `subject` was recorded.
    #[must_use]
    pub fn contains(&self, kind: DiagnosticKind, subject: &str) -> bool {
        self.records
            .read()
            .iter()
            .any(|d| d.kind == kind && d.subject.as_deref() == Some(subject))
    }

    /// Returns the number of collected diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected diagnostics.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.records.write().push(diagnostic.clone());
    }
}
