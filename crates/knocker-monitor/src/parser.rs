//! Parsing of journal records into knocker events.
//!
//! A journal line (as printed by `journalctl -o json`) is first flattened into
//! a [`RawRecord`], a map from field name to string. [`EntryParser`] then turns
//! the record into a typed [`Event`], or ignores it when it is not a knocker
//! event.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};
use crate::types::{CadenceSource, Event, EventFields, EventKind, ServiceState};

/// One structured journal record: field name to string value.
pub type RawRecord = BTreeMap<String, String>;

/// Schema version this parser is built against.
pub const SCHEMA_VERSION: &str = "1";

/// Journal field names recognized by the parser.
pub mod keys {
    /// Event kind tag.
    pub const EVENT: &str = "KNOCKER_EVENT";
    /// Schema version tag.
    pub const SCHEMA_VERSION: &str = "KNOCKER_SCHEMA_VERSION";
    /// Human-readable message.
    pub const MESSAGE: &str = "MESSAGE";
    /// Journal realtime timestamp, microseconds since the epoch.
    pub const REALTIME_TIMESTAMP: &str = "__REALTIME_TIMESTAMP";
    /// Journal cursor.
    pub const CURSOR: &str = "__CURSOR";

    /// Service run state.
    pub const SERVICE_STATE: &str = "KNOCKER_SERVICE_STATE";
    /// Service version.
    pub const VERSION: &str = "KNOCKER_VERSION";
    /// Whitelisted address.
    pub const WHITELIST_IP: &str = "KNOCKER_WHITELIST_IP";
    /// Whitelist expiry, unix seconds.
    pub const EXPIRES_UNIX: &str = "KNOCKER_EXPIRES_UNIX";
    /// Whitelist time-to-live, seconds.
    pub const TTL_SEC: &str = "KNOCKER_TTL_SEC";
    /// Next knock, unix seconds.
    pub const NEXT_AT_UNIX: &str = "KNOCKER_NEXT_AT_UNIX";
    /// Mechanism behind the next knock.
    pub const CADENCE_SOURCE: &str = "KNOCKER_CADENCE_SOURCE";
    /// What triggered a knock.
    pub const TRIGGER_SOURCE: &str = "KNOCKER_TRIGGER_SOURCE";
    /// Knock outcome.
    pub const RESULT: &str = "KNOCKER_RESULT";
    /// Error code.
    pub const ERROR_CODE: &str = "KNOCKER_ERROR_CODE";
    /// Error message.
    pub const ERROR_MSG: &str = "KNOCKER_ERROR_MSG";
    /// Error context.
    pub const CONTEXT: &str = "KNOCKER_CONTEXT";
    /// Knock profile (reserved).
    pub const PROFILE: &str = "KNOCKER_PROFILE";
    /// Knocked ports (reserved).
    pub const PORTS: &str = "KNOCKER_PORTS";
}

/// Parser for knocker journal records.
#[derive(Debug, Clone)]
pub struct EntryParser {
    schema_version: String,
}

impl Default for EntryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser {
    /// Creates a parser for the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self::with_schema_version(SCHEMA_VERSION)
    }

    /// Creates a parser expecting a custom schema version.
    #[must_use]
    pub fn with_schema_version(version: impl Into<String>) -> Self {
        Self {
            schema_version: version.into(),
        }
    }

    /// Returns the schema version this parser expects.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Parses one journal JSON line.
    ///
    /// Returns `Ok(None)` for blank lines and for records that are not knocker
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::MalformedRecord`] if the line is not a JSON object.
    pub fn parse_line(&self, line: &str) -> Result<Option<Event>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let record = Self::record_from_json(trimmed)?;
        Ok(self.parse_record(&record))
    }

    /// Flattens a journal JSON object into a [`RawRecord`].
    ///
    /// Multi-valued fields keep their last string value; binary fields
    /// (byte arrays) and other non-string values are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::MalformedRecord`] if the line is not a JSON object.
    pub fn record_from_json(line: &str) -> Result<RawRecord> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| MonitorError::MalformedRecord(e.to_string()))?;

        let Value::Object(obj) = value else {
            return Err(MonitorError::MalformedRecord(
                "expected a JSON object".to_string(),
            ));
        };

        Ok(obj
            .into_iter()
            .filter_map(|(key, value)| Self::field_value(value).map(|v| (key, v)))
            .collect())
    }

    fn field_value(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(items) => items.into_iter().rev().find_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Converts a record into an event.
    ///
    /// Records without an event-kind tag, or with a tag this parser does not
    /// know, yield `None`. A schema version mismatch is logged and the record
    /// is still parsed.
    #[must_use]
    pub fn parse_record(&self, record: &RawRecord) -> Option<Event> {
        let tag = text(record, keys::EVENT)?;
        let kind = match tag.parse::<EventKind>() {
            Ok(kind) => kind,
            Err(_) => {
                debug!(tag, "ignoring unknown knocker event kind");
                return None;
            }
        };

        if let Err(e) = self.check_schema(record) {
            warn!(event = %kind, error = %e, "parsing record with unexpected schema version");
        }

        Some(Event {
            kind,
            message: text(record, keys::MESSAGE).unwrap_or_default().to_string(),
            fields: Self::extract_fields(record),
            timestamp: text(record, keys::REALTIME_TIMESTAMP)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_micros),
            cursor: text(record, keys::CURSOR).map(str::to_string),
            schema_version: text(record, keys::SCHEMA_VERSION).map(str::to_string),
        })
    }

    /// Checks the record's schema version tag.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::SchemaVersionMismatch`] if the tag is missing or
    /// differs from the expected version.
    pub fn check_schema(&self, record: &RawRecord) -> Result<()> {
        let found = text(record, keys::SCHEMA_VERSION);
        if found == Some(self.schema_version.as_str()) {
            return Ok(());
        }
        Err(MonitorError::SchemaVersionMismatch {
            expected: self.schema_version.clone(),
            found: found.map(str::to_string),
        })
    }

    fn extract_fields(record: &RawRecord) -> EventFields {
        let owned = |key: &str| text(record, key).map(str::to_string);

        EventFields {
            service_state: text(record, keys::SERVICE_STATE).map(ServiceState::from_wire),
            version: owned(keys::VERSION),
            whitelist_ip: owned(keys::WHITELIST_IP),
            expires_at: unix_time(record, keys::EXPIRES_UNIX),
            ttl: integer(record, keys::TTL_SEC)
                .and_then(|secs| u64::try_from(secs).ok())
                .map(Duration::from_secs),
            next_at: unix_time(record, keys::NEXT_AT_UNIX),
            cadence_source: text(record, keys::CADENCE_SOURCE).and_then(CadenceSource::from_wire),
            trigger_source: owned(keys::TRIGGER_SOURCE),
            result: owned(keys::RESULT),
            error_code: owned(keys::ERROR_CODE),
            error_message: owned(keys::ERROR_MSG),
            context: owned(keys::CONTEXT),
            profile: owned(keys::PROFILE),
            ports: owned(keys::PORTS),
        }
    }
}

/// Non-empty string value of a field.
fn text<'a>(record: &'a RawRecord, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Base-10 integer value of a field; anything else is absent.
fn integer(record: &RawRecord, key: &str) -> Option<i64> {
    text(record, key).and_then(|v| v.trim().parse::<i64>().ok())
}

fn unix_time(record: &RawRecord, key: &str) -> Option<DateTime<Utc>> {
    integer(record, key).and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn parses_whitelist_applied_line() {
        let parser = EntryParser::new();
        let line = r#"{"KNOCKER_EVENT":"WhitelistApplied","KNOCKER_SCHEMA_VERSION":"1","MESSAGE":"whitelisted","KNOCKER_WHITELIST_IP":"198.51.100.4","KNOCKER_EXPIRES_UNIX":"1700000600","KNOCKER_TTL_SEC":"600","__REALTIME_TIMESTAMP":"1700000000000000","__CURSOR":"s=abc;i=1"}"#;

        let event = parser.parse_line(line).ok().flatten();
        assert!(event.is_some());
        let Some(event) = event else { return };

        assert_eq!(event.kind, EventKind::WhitelistApplied);
        assert_eq!(event.message, "whitelisted");
        assert_eq!(event.fields.whitelist_ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(event.fields.expires_at, DateTime::from_timestamp(1_700_000_600, 0));
        assert_eq!(event.fields.ttl, Some(Duration::from_secs(600)));
        assert_eq!(event.timestamp, DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(event.cursor.as_deref(), Some("s=abc;i=1"));
        assert_eq!(event.schema_version.as_deref(), Some("1"));
    }

    #[test_case("not json at all" ; "plain text")]
    #[test_case("{\"KNOCKER_EVENT\": " ; "truncated object")]
    #[test_case("[\"KNOCKER_EVENT\"]" ; "array")]
    #[test_case("42" ; "number")]
    fn malformed_lines_are_rejected(line: &str) {
        let parser = EntryParser::new();
        assert!(matches!(
            parser.parse_line(line),
            Err(MonitorError::MalformedRecord(_))
        ));
    }

    #[test]
    fn blank_line_is_ignored() {
        let parser = EntryParser::new();
        assert!(matches!(parser.parse_line("   "), Ok(None)));
    }

    #[test]
    fn record_without_event_tag_yields_nothing() {
        let parser = EntryParser::new();
        let rec = record(&[("MESSAGE", "Started knocker.service"), ("_PID", "1")]);
        assert!(parser.parse_record(&rec).is_none());

        let rec = record(&[("KNOCKER_EVENT", ""), ("MESSAGE", "empty tag")]);
        assert!(parser.parse_record(&rec).is_none());
    }

    #[test]
    fn unknown_event_tag_yields_nothing() {
        let parser = EntryParser::new();
        let rec = record(&[("KNOCKER_EVENT", "Rebooted"), ("KNOCKER_SCHEMA_VERSION", "1")]);
        assert!(parser.parse_record(&rec).is_none());
    }

    #[test_case("KNOCKER_EXPIRES_UNIX", "soon" ; "expiry")]
    #[test_case("KNOCKER_TTL_SEC", "10m" ; "ttl")]
    #[test_case("KNOCKER_TTL_SEC", "-5" ; "negative ttl")]
    #[test_case("KNOCKER_NEXT_AT_UNIX", "1.5e9" ; "next knock")]
    fn non_numeric_field_is_absent(key: &str, value: &str) {
        let parser = EntryParser::new();
        let rec = record(&[
            ("KNOCKER_EVENT", "StatusSnapshot"),
            ("KNOCKER_SCHEMA_VERSION", "1"),
            ("KNOCKER_WHITELIST_IP", "192.0.2.10"),
            (key, value),
        ]);

        let event = parser.parse_record(&rec);
        assert!(event.is_some());
        let Some(event) = event else { return };
        assert_eq!(event.fields.whitelist_ip.as_deref(), Some("192.0.2.10"));
        assert_eq!(event.fields.expires_at, None);
        assert_eq!(event.fields.ttl, None);
        assert_eq!(event.fields.next_at, None);
    }

    #[test]
    fn schema_mismatch_still_parses() {
        let parser = EntryParser::new();
        let rec = record(&[
            ("KNOCKER_EVENT", "NextKnockUpdated"),
            ("KNOCKER_SCHEMA_VERSION", "2"),
            ("KNOCKER_NEXT_AT_UNIX", "1700000900"),
        ]);

        assert!(matches!(
            parser.check_schema(&rec),
            Err(MonitorError::SchemaVersionMismatch { ref found, .. })
                if found.as_deref() == Some("2")
        ));
        let event = parser.parse_record(&rec);
        assert_eq!(
            event.and_then(|e| e.fields.next_at),
            DateTime::from_timestamp(1_700_000_900, 0)
        );
    }

    #[test]
    fn missing_schema_version_is_a_mismatch() {
        let parser = EntryParser::new();
        let rec = record(&[("KNOCKER_EVENT", "KnockTriggered")]);
        assert!(parser.check_schema(&rec).is_err());
        assert!(parser.parse_record(&rec).is_some());
    }

    #[test]
    fn custom_schema_version() {
        let parser = EntryParser::with_schema_version("2");
        assert_eq!(parser.schema_version(), "2");
        let rec = record(&[("KNOCKER_EVENT", "Error"), ("KNOCKER_SCHEMA_VERSION", "2")]);
        assert!(parser.check_schema(&rec).is_ok());
    }

    #[test]
    fn extracts_error_and_trigger_fields() {
        let parser = EntryParser::new();
        let rec = record(&[
            ("KNOCKER_EVENT", "Error"),
            ("KNOCKER_SCHEMA_VERSION", "1"),
            ("MESSAGE", "knock failed"),
            ("KNOCKER_ERROR_CODE", "E_TIMEOUT"),
            ("KNOCKER_ERROR_MSG", "server did not answer"),
            ("KNOCKER_CONTEXT", "knock"),
            ("KNOCKER_TRIGGER_SOURCE", "timer"),
            ("KNOCKER_RESULT", "failure"),
            ("KNOCKER_PROFILE", "home"),
            ("KNOCKER_PORTS", "22,443"),
        ]);

        let fields = parser.parse_record(&rec).map(|e| e.fields).unwrap_or_default();
        assert_eq!(fields.error_code.as_deref(), Some("E_TIMEOUT"));
        assert_eq!(fields.error_message.as_deref(), Some("server did not answer"));
        assert_eq!(fields.context.as_deref(), Some("knock"));
        assert_eq!(fields.trigger_source.as_deref(), Some("timer"));
        assert_eq!(fields.result.as_deref(), Some("failure"));
        assert_eq!(fields.profile.as_deref(), Some("home"));
        assert_eq!(fields.ports.as_deref(), Some("22,443"));
    }

    #[test]
    fn service_state_and_cadence_fields() {
        let parser = EntryParser::new();
        let rec = record(&[
            ("KNOCKER_EVENT", "StatusSnapshot"),
            ("KNOCKER_SCHEMA_VERSION", "1"),
            ("KNOCKER_SERVICE_STATE", "running"),
            ("KNOCKER_VERSION", "0.4.2"),
            ("KNOCKER_CADENCE_SOURCE", "ttl_response"),
        ]);

        let fields = parser.parse_record(&rec).map(|e| e.fields).unwrap_or_default();
        assert_eq!(fields.service_state, Some(ServiceState::Running));
        assert_eq!(fields.version.as_deref(), Some("0.4.2"));
        assert_eq!(fields.cadence_source, Some(CadenceSource::TtlResponse));
    }

    #[test]
    fn record_from_json_flattens_journal_values() {
        let line = r#"{"MESSAGE":[104,105],"KNOCKER_EVENT":["Error","KnockTriggered"],"PRIORITY":6,"_EMPTY":null}"#;
        let rec = EntryParser::record_from_json(line).unwrap_or_default();

        assert!(!rec.contains_key("MESSAGE"));
        assert!(!rec.contains_key("_EMPTY"));
        assert_eq!(rec.get("KNOCKER_EVENT").map(String::as_str), Some("KnockTriggered"));
        assert_eq!(rec.get("PRIORITY").map(String::as_str), Some("6"));
    }
}
