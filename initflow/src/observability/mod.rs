//! Observability utilities.
//!
//! The orchestrator never logs directly: every log-worthy fact is handed to
//! an injected [`DiagnosticSink`]. The default sink forwards to `tracing`.

mod diagnostics;
mod timer;

pub use diagnostics::{
    CollectingDiagnostics, Diagnostic, DiagnosticKind, DiagnosticLevel, DiagnosticSink,
    NoOpDiagnostics, TracingDiagnostics,
};
pub use timer::SpanTimer;
