//! Error types for the initflow orchestrator.
//!
//! Nothing here is ever raised out of `execute`, `reload`, `reload_all` or
//! `resume`. Registration problems come back as [`RegistrationError`] values
//! the caller may inspect or ignore; load failures are captured per node as a
//! [`LoadError`](crate::core::LoadError).

use thiserror::Error;

/// The main error type for initflow operations.
#[derive(Debug, Error)]
pub enum InitflowError {
    /// A node or stage could not be registered.
    #[error("{0}")]
    Registration(#[from] RegistrationError),

    /// The configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned when a node or stage is rejected at registration.
///
/// Rejection never changes the already-registered state: the first node with
/// a given id stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A node with this id is already registered.
    #[error("Node '{0}' is already registered")]
    DuplicateNode(String),

    /// A stage with this id is already registered.
    #[error("Stage '{0}' is already registered")]
    DuplicateStage(String),

    /// The id is empty or contains characters outside the allowed set.
    #[error("Invalid id '{0}': ids must match {pattern}", pattern = crate::utils::ID_PATTERN)]
    InvalidId(String),
}

impl RegistrationError {
    /// Returns the id the error refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::DuplicateNode(id) | Self::DuplicateStage(id) | Self::InvalidId(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::DuplicateNode("assets".to_string());
        assert_eq!(err.to_string(), "Node 'assets' is already registered");
        assert_eq!(err.id(), "assets");
    }

    #[test]
    fn test_invalid_id_mentions_pattern() {
        let err = RegistrationError::InvalidId("bad id".to_string());
        assert!(err.to_string().contains("bad id"));
        assert!(err.to_string().contains("must match"));
    }

    #[test]
    fn test_initflow_error_from_registration() {
        let err: InitflowError = RegistrationError::DuplicateStage("core".to_string()).into();
        assert_eq!(err.to_string(), "Stage 'core' is already registered");
    }

    #[test]
    fn test_config_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: InitflowError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
