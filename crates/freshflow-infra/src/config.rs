//! Engine configuration loader for Freshflow.
//!
//! Reads `freshflow.toml` from a configuration directory and deserializes it
//! into [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed.
//!
//! Loading and reporting are split so a binary can read the file, install
//! its tracing subscriber from the result, and only then log what happened.

use std::path::{Path, PathBuf};

use freshflow_types::config::EngineConfig;
use thiserror::Error;

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "freshflow.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read `{config_dir}/freshflow.toml` without logging.
///
/// A missing file is not an error: it yields [`EngineConfig::default()`].
pub async fn try_load_engine_config(config_dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(EngineConfig::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
}

/// Log the outcome of [`try_load_engine_config`] and pick the config to use.
///
/// - Error: logs a warning and returns the default.
/// - `max_concurrent_runs = 0`: logs a warning; runs execute one at a time.
pub fn settle_engine_config(loaded: Result<EngineConfig, ConfigError>) -> EngineConfig {
    match loaded {
        Ok(config) => {
            if config.max_concurrent_runs == 0 {
                tracing::warn!("max_concurrent_runs = 0 in {CONFIG_FILE_NAME}, runs will execute one at a time");
            }
            config
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            EngineConfig::default()
        }
    }
}

/// Load engine configuration from `{config_dir}/freshflow.toml`, logging any
/// problem through the current subscriber.
///
/// - Missing file: returns [`EngineConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
/// - Otherwise returns the parsed config, with unset fields defaulted.
pub async fn load_engine_config(config_dir: &Path) -> EngineConfig {
    settle_engine_config(try_load_engine_config(config_dir).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_engine_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_runs, 4);
        assert_eq!(config.mailbox_capacity, 256);
    }

    #[tokio::test]
    async fn load_engine_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
max_concurrent_runs = 8
listener_poll_interval_ms = 200
otel_enabled = true
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_runs, 8);
        assert_eq!(config.listener_poll_interval(), Duration::from_millis(200));
        assert!(config.otel_enabled);
        assert_eq!(config.mailbox_capacity, 256);
    }

    #[tokio::test]
    async fn load_engine_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE_NAME), "max_concurrent_runs = \"many\"")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_runs, 4);
    }

    #[tokio::test]
    async fn try_load_reports_parse_error_with_path() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE_NAME), "mailbox_capacity = [")
            .await
            .unwrap();

        let err = try_load_engine_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[tokio::test]
    async fn try_load_reports_unreadable_file() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be cannot be read as text.
        tokio::fs::create_dir(tmp.path().join(CONFIG_FILE_NAME)).await.unwrap();

        let err = try_load_engine_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(settle_engine_config(Err(err)).max_concurrent_runs, 4);
    }

    #[tokio::test]
    async fn try_load_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = try_load_engine_config(tmp.path()).await.unwrap();
        assert_eq!(config.mailbox_capacity, 256);
    }

    #[test]
    fn settle_keeps_loaded_config() {
        let loaded = EngineConfig {
            max_concurrent_runs: 0,
            json_logs: true,
            ..Default::default()
        };
        let config = settle_engine_config(Ok(loaded));
        assert_eq!(config.max_concurrent_runs, 0);
        assert!(config.json_logs);
    }
}
