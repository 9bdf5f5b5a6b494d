//! Status command implementation.
//!
//! Seeds a snapshot from the journal backlog once and prints it, without
//! following the journal.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use knocker_monitor::{fold, BacklogLoader, EntryParser, LogQuery, MonitorConfig};

use crate::error::CliError;
use crate::output::{OutputFormat, StatusView};

/// Status command executor.
pub struct StatusCommand<Q> {
    loader: BacklogLoader<Q>,
    max_records: usize,
}

impl<Q: LogQuery> StatusCommand<Q> {
    /// Create a status command reading through `query`.
    #[must_use]
    pub fn new(config: &MonitorConfig, query: Q) -> Self {
        Self {
            loader: BacklogLoader::new(
                Arc::new(query),
                EntryParser::with_schema_version(config.schema_version.clone()),
                config.unit.clone(),
            ),
            max_records: config.backlog_records,
        }
    }

    /// Execute the status command.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let events = self
            .loader
            .load(self.max_records, &CancellationToken::new())
            .await;
        let view = StatusView::new(fold(&events), Utc::now());
        format.write(writer, &view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use knocker_monitor::{MonitorError, Result};

    struct FixedQuery(Vec<String>);

    impl LogQuery for FixedQuery {
        async fn query(
            &self,
            _unit: &str,
            _max_records: usize,
            _cancel: &CancellationToken,
        ) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenQuery;

    impl LogQuery for BrokenQuery {
        async fn query(
            &self,
            _unit: &str,
            _max_records: usize,
            _cancel: &CancellationToken,
        ) -> Result<Vec<String>> {
            Err(MonitorError::Query("journalctl not found".to_string()))
        }
    }

    #[tokio::test]
    async fn prints_state_from_backlog() {
        let lines = vec![
            r#"{"KNOCKER_EVENT":"ServiceState","KNOCKER_SCHEMA_VERSION":"1","KNOCKER_SERVICE_STATE":"started","KNOCKER_VERSION":"0.4.1","__REALTIME_TIMESTAMP":"1000000"}"#.to_string(),
        ];
        let command = StatusCommand::new(&MonitorConfig::default(), FixedQuery(lines));
        let mut out = Vec::new();
        command
            .execute(&mut out, &OutputFormat::new(Format::Json))
            .await
            .expect("status");

        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["service_state"], "running");
        assert_eq!(value["service_version"], "0.4.1");
    }

    #[tokio::test]
    async fn unreadable_journal_prints_empty_state() {
        let command = StatusCommand::new(&MonitorConfig::default(), BrokenQuery);
        let mut out = Vec::new();
        command
            .execute(&mut out, &OutputFormat::default())
            .await
            .expect("status");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("No active whitelist"));
        assert!(text.contains("No scheduled knock"));
    }
}
