//! Orchestrator configuration.

use crate::errors::InitflowError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;

/// Configuration for an [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Domain label, also used as the store name.
    pub name: String,
    /// Sever dependency cycles and run the affected nodes anyway.
    pub break_cycles: bool,
    /// Reload Stale dependents after a successful reload.
    pub cascade_reloads: bool,
    /// Level of an auto-attached event logger; `None` attaches nothing.
    pub event_log_level: Option<String>,
    /// Warn when staged execution leaves nodes outside every stage.
    pub warn_unstaged_nodes: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            break_cycles: true,
            cascade_reloads: true,
            event_log_level: None,
            warn_unstaged_nodes: true,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, InitflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.event_level()?;
        Ok(config)
    }

    /// Sets the domain label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables cycle breaking.
    #[must_use]
    pub fn with_break_cycles(mut self, enabled: bool) -> Self {
        self.break_cycles = enabled;
        self
    }

    /// Enables or disables reload cascades.
    #[must_use]
    pub fn with_cascade_reloads(mut self, enabled: bool) -> Self {
        self.cascade_reloads = enabled;
        self
    }

    /// Attaches an event logger at `level`.
    #[must_use]
    pub fn with_event_log_level(mut self, level: Level) -> Self {
        self.event_log_level = Some(level.to_string());
        self
    }

    /// Enables or disables the unstaged-node warning.
    #[must_use]
    pub fn with_warn_unstaged_nodes(mut self, enabled: bool) -> Self {
        self.warn_unstaged_nodes = enabled;
        self
    }

    /// Returns the parsed event log level.
    pub fn event_level(&self) -> Result<Option<Level>, InitflowError> {
        self.event_log_level
            .as_deref()
            .map(|raw| {
                Level::from_str(raw)
                    .map_err(|_| InitflowError::Config(format!("invalid event_log_level '{raw}'")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.name, "default");
        assert!(config.break_cycles);
        assert!(config.cascade_reloads);
        assert!(config.warn_unstaged_nodes);
        assert_eq!(config.event_log_level, None);
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .with_name("client")
            .with_cascade_reloads(false)
            .with_event_log_level(Level::DEBUG);
        assert_eq!(config.name, "client");
        assert!(!config.cascade_reloads);
        assert_eq!(config.event_level().unwrap(), Some(Level::DEBUG));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            OrchestratorConfig::from_json(r#"{"name": "server", "break_cycles": false}"#).unwrap();
        assert_eq!(config.name, "server");
        assert!(!config.break_cycles);
        assert!(config.cascade_reloads);
    }

    #[test]
    fn test_from_json_rejects_bad_level() {
        let err = OrchestratorConfig::from_json(r#"{"event_log_level": "loud"}"#).unwrap_err();
        assert!(matches!(err, InitflowError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_bad_json() {
        let err = OrchestratorConfig::from_json("{").unwrap_err();
        assert!(matches!(err, InitflowError::Serialization(_)));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = OrchestratorConfig::new().with_name("x");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(OrchestratorConfig::from_json(&json).unwrap(), config);
    }
}
