//! Engine configuration types for Freshflow.
//!
//! `EngineConfig` represents the `freshflow.toml` that controls run
//! concurrency, event mailbox sizing, and logging.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the workflow engine.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of workflow runs executing at once. Extra runs queue.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Capacity of each listener mailbox. A full mailbox is dropped.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// How long a live listener waits for an event before re-checking
    /// for cancellation.
    #[serde(default = "default_listener_poll_interval_ms")]
    pub listener_poll_interval_ms: u64,

    /// Bridge tracing spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel_enabled: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_max_concurrent_runs() -> usize {
    4
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_listener_poll_interval_ms() -> u64 {
    1000
}

impl EngineConfig {
    pub fn listener_poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener_poll_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
            mailbox_capacity: default_mailbox_capacity(),
            listener_poll_interval_ms: default_listener_poll_interval_ms(),
            otel_enabled: false,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_runs, 4);
        assert_eq!(config.mailbox_capacity, 256);
        assert_eq!(config.listener_poll_interval(), Duration::from_secs(1));
        assert!(!config.otel_enabled);
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_concurrent_runs, 4);
        assert_eq!(config.listener_poll_interval_ms, 1000);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
max_concurrent_runs = 16
mailbox_capacity = 32
listener_poll_interval_ms = 250
json_logs = true
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_concurrent_runs, 16);
        assert_eq!(config.mailbox_capacity, 32);
        assert_eq!(config.listener_poll_interval(), Duration::from_millis(250));
        assert!(config.json_logs);
        assert!(!config.otel_enabled);
    }
}
