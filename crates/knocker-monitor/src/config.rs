//! Monitor configuration.
//!
//! Configuration for the knocker monitor, including:
//! - The journal unit to follow and its systemd scope
//! - Backlog size
//! - Reconnect delays
//! - The expected event schema version

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};
use crate::follower::BackoffPolicy;
use crate::parser::SCHEMA_VERSION;

/// Main monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Systemd unit whose journal is followed.
    pub unit: String,
    /// Whether the unit is a user unit (`--user`).
    pub user_scope: bool,
    /// Maximum number of records loaded at startup.
    pub backlog_records: usize,
    /// Delay before retrying after the stream failed to open, in seconds.
    pub open_retry_secs: u64,
    /// Delay before reconnecting after the stream ended, in seconds.
    pub stream_retry_secs: u64,
    /// Schema version the parser expects.
    pub schema_version: String,
    /// Whether backlog events are also published to subscribers.
    pub replay_backlog: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            unit: "knocker.service".to_string(),
            user_scope: true,
            backlog_records: 100,
            open_retry_secs: 5,
            stream_retry_secs: 2,
            schema_version: SCHEMA_VERSION.to_string(),
            replay_backlog: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MonitorError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| MonitorError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.unit.trim().is_empty() {
            return Err(MonitorError::Config("unit cannot be empty".to_string()));
        }

        if self.backlog_records == 0 {
            return Err(MonitorError::Config(
                "backlog_records must be greater than 0".to_string(),
            ));
        }

        if self.schema_version.is_empty() {
            return Err(MonitorError::Config(
                "schema_version cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Reconnect delays as a [`BackoffPolicy`].
    #[must_use]
    pub const fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            open_failure: Duration::from_secs(self.open_retry_secs),
            stream_end: Duration::from_secs(self.stream_retry_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_service_conventions() {
        let config = MonitorConfig::default();
        assert_eq!(config.unit, "knocker.service");
        assert!(config.user_scope);
        assert_eq!(config.backlog_records, 100);
        assert_eq!(config.backoff(), BackoffPolicy::default());
        assert_eq!(config.schema_version, "1");
        assert!(!config.replay_backlog);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            MonitorConfig::from_json(r#"{"unit":"knocker-dev.service","backlog_records":20}"#)
                .expect("parse config");
        assert_eq!(config.unit, "knocker-dev.service");
        assert_eq!(config.backlog_records, 20);
        assert_eq!(config.open_retry_secs, 5);
    }

    #[test]
    fn empty_unit_is_rejected() {
        let result = MonitorConfig::from_json(r#"{"unit":"  "}"#);
        assert!(matches!(result, Err(MonitorError::Config(msg)) if msg.contains("unit")));
    }

    #[test]
    fn zero_backlog_is_rejected() {
        let result = MonitorConfig::from_json(r#"{"backlog_records":0}"#);
        assert!(matches!(
            result,
            Err(MonitorError::Config(msg)) if msg.contains("backlog_records")
        ));
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let result = MonitorConfig::from_json("unit = knocker");
        assert!(matches!(result, Err(MonitorError::Config(msg)) if msg.contains("invalid JSON")));
    }

    #[test]
    fn from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, r#"{{"user_scope": false, "open_retry_secs": 9}}"#)
            .expect("write config");

        let config = MonitorConfig::from_file(file.path()).expect("load config");
        assert!(!config.user_scope);
        assert_eq!(config.backoff().open_failure, Duration::from_secs(9));
    }

    #[test]
    fn missing_file_names_the_path() {
        let result = MonitorConfig::from_file("/nonexistent/knocker-monitor.json");
        assert!(matches!(
            result,
            Err(MonitorError::Config(msg)) if msg.contains("/nonexistent/knocker-monitor.json")
        ));
    }
}
