//! Captured load errors.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// How a load attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorKind {
    /// The work closure returned an error.
    Failed,
    /// The work closure panicked.
    Panicked,
    /// A reload was requested on a node that is not reloadable.
    NotReloadable,
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Panicked => write!(f, "panicked"),
            Self::NotReloadable => write!(f, "not_reloadable"),
        }
    }
}

/// An error captured from a work closure.
///
/// The original `anyhow::Error` is flattened into its display chain so the
/// value can be cloned into results and events and serialized by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadError {
    /// How the attempt failed.
    pub kind: LoadErrorKind,
    /// The top-level error message.
    pub message: String,
    /// Messages of the underlying causes, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl LoadError {
    /// Creates a new load error of the given kind.
    #[must_use]
    pub fn new(kind: LoadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Captures an error returned by a work closure.
    #[must_use]
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            kind: LoadErrorKind::Failed,
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }

    /// Captures a panic payload from a work closure.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "work closure panicked".to_string());
        Self::new(LoadErrorKind::Panicked, message)
    }

    /// Creates the error returned when reloading a non-reloadable node.
    #[must_use]
    pub fn not_reloadable(node_id: &str) -> Self {
        Self::new(
            LoadErrorKind::NotReloadable,
            format!("Node '{node_id}' is not reloadable"),
        )
    }

    /// Returns the message followed by its causes, joined with `": "`.
    #[must_use]
    pub fn full_message(&self) -> String {
        if self.causes.is_empty() {
            return self.message.clone();
        }
        let mut parts = Vec::with_capacity(self.causes.len() + 1);
        parts.push(self.message.as_str());
        parts.extend(self.causes.iter().map(String::as_str));
        parts.join(": ")
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_from_anyhow_keeps_chain() {
        let inner: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "blocks.json missing",
        ));
        let err = inner.context("loading block registry").unwrap_err();

        let captured = LoadError::from_anyhow(&err);
        assert_eq!(captured.kind, LoadErrorKind::Failed);
        assert_eq!(captured.message, "loading block registry");
        assert_eq!(captured.causes, vec!["blocks.json missing".to_string()]);
        assert_eq!(
            captured.full_message(),
            "loading block registry: blocks.json missing"
        );
    }

    #[test]
    fn test_from_panic_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(LoadError::from_panic(payload.as_ref()).message, "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        let err = LoadError::from_panic(payload.as_ref());
        assert_eq!(err.kind, LoadErrorKind::Panicked);
        assert_eq!(err.message, "kaboom");
    }

    #[test]
    fn test_from_panic_unknown_payload() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(
            LoadError::from_panic(payload.as_ref()).message,
            "work closure panicked"
        );
    }

    #[test]
    fn test_not_reloadable() {
        let err = LoadError::not_reloadable("physics");
        assert_eq!(err.kind, LoadErrorKind::NotReloadable);
        assert_eq!(err.to_string(), "Node 'physics' is not reloadable");
    }
}
