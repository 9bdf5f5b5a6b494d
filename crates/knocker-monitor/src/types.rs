//! Core types for the knocker event model.
//!
//! This module provides:
//! - [`EventKind`]: The closed set of knocker journal events
//! - [`Event`]: A parsed, immutable journal event
//! - [`EventFields`]: Kind-specific payload, every field optional
//! - [`StateSnapshot`]: The aggregate state derived from events
//! - [`ServiceState`] / [`CadenceSource`]: Enumerated field values

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Kind of a knocker journal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The service started, stopped or failed.
    ServiceState,
    /// Authoritative full state of whitelist and cadence.
    StatusSnapshot,
    /// An address was whitelisted.
    WhitelistApplied,
    /// The current whitelist entry expired.
    WhitelistExpired,
    /// The next automatic knock was rescheduled.
    NextKnockUpdated,
    /// A knock was performed.
    KnockTriggered,
    /// The service reported an error.
    Error,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ServiceState,
        Self::StatusSnapshot,
        Self::WhitelistApplied,
        Self::WhitelistExpired,
        Self::NextKnockUpdated,
        Self::KnockTriggered,
        Self::Error,
    ];

    /// Returns the wire tag of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceState => "ServiceState",
            Self::StatusSnapshot => "StatusSnapshot",
            Self::WhitelistApplied => "WhitelistApplied",
            Self::WhitelistExpired => "WhitelistExpired",
            Self::NextKnockUpdated => "NextKnockUpdated",
            Self::KnockTriggered => "KnockTriggered",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MonitorError::MalformedRecord(format!("unknown event kind: {s}")))
    }
}

/// Run state of the knocker service as reported in the journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// No state event seen, or an unrecognized value.
    #[default]
    Unknown,
    /// The service is not running.
    Stopped,
    /// The service is running.
    Running,
    /// The service exited with a failure.
    Failed,
}

impl ServiceState {
    /// Parses a wire value. Unrecognized values map to [`ServiceState::Unknown`].
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "running" | "active" | "started" => Self::Running,
            "stopped" | "inactive" => Self::Stopped,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Returns the lowercase name of this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanism that determined when the next knock fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceSource {
    /// Derived from the configured whitelist TTL.
    Ttl,
    /// Derived from the TTL returned by the knock server.
    TtlResponse,
    /// Fixed check interval.
    CheckInterval,
}

impl CadenceSource {
    /// Parses a wire value, returning `None` for anything unrecognized.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim() {
            "ttl" => Some(Self::Ttl),
            "ttl_response" => Some(Self::TtlResponse),
            "check_interval" => Some(Self::CheckInterval),
            _ => None,
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ttl => "ttl",
            Self::TtlResponse => "ttl_response",
            Self::CheckInterval => "check_interval",
        }
    }

    /// Human-readable description for status displays.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Ttl => "based on TTL",
            Self::TtlResponse => "based on TTL response",
            Self::CheckInterval => "based on interval",
        }
    }
}

/// Kind-specific payload of an event.
///
/// A field is `None` whenever the raw record did not carry it (or carried an
/// unparseable value for a numeric field).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    /// Reported service state.
    pub service_state: Option<ServiceState>,
    /// Service version string.
    pub version: Option<String>,
    /// Whitelisted address.
    pub whitelist_ip: Option<String>,
    /// When the whitelist entry expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whitelist time-to-live.
    #[serde(default, with = "opt_secs")]
    pub ttl: Option<Duration>,
    /// When the next automatic knock fires.
    pub next_at: Option<DateTime<Utc>>,
    /// Mechanism behind `next_at`.
    pub cadence_source: Option<CadenceSource>,
    /// What triggered a knock (timer, manual, ...).
    pub trigger_source: Option<String>,
    /// Outcome of a knock.
    pub result: Option<String>,
    /// Error code of an `Error` event.
    pub error_code: Option<String>,
    /// Error message of an `Error` event.
    pub error_message: Option<String>,
    /// Free-form error context.
    pub context: Option<String>,
    /// Knock profile name (reserved).
    pub profile: Option<String>,
    /// Knocked ports (reserved).
    pub ports: Option<String>,
}

/// A parsed knocker journal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// The journal `MESSAGE`, empty if absent.
    pub message: String,
    /// Kind-specific payload.
    pub fields: EventFields,
    /// Journal realtime timestamp of the record.
    pub timestamp: Option<DateTime<Utc>>,
    /// Journal cursor of the record.
    pub cursor: Option<String>,
    /// Schema version advertised by the record.
    pub schema_version: Option<String>,
}

impl Event {
    /// Creates an event of the given kind with an empty payload.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            message: String::new(),
            fields: EventFields::default(),
            timestamp: None,
            cursor: None,
            schema_version: None,
        }
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_fields(mut self, fields: EventFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the journal timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the journal cursor.
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Best description of what went wrong for an `Error` event.
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.fields
            .error_message
            .as_deref()
            .unwrap_or(self.message.as_str())
    }
}

/// The monitor's best-known state of the knocker service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Currently whitelisted address.
    pub whitelist_ip: Option<String>,
    /// When the whitelist entry expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whitelist time-to-live.
    #[serde(default, with = "opt_secs")]
    pub ttl: Option<Duration>,
    /// When the next automatic knock fires.
    pub next_knock_at: Option<DateTime<Utc>>,
    /// Mechanism behind `next_knock_at`.
    pub cadence_source: Option<CadenceSource>,
    /// Last reported service state.
    pub service_state: ServiceState,
    /// Last reported service version.
    pub service_version: Option<String>,
}

impl StateSnapshot {
    /// Time left until the whitelist expires; negative once expired.
    ///
    /// Returns `None` when no address is whitelisted or no expiry is known.
    #[must_use]
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.whitelist_ip.as_ref()?;
        self.expires_at.map(|at| at - now)
    }

    /// Time left until the next knock; negative once overdue.
    #[must_use]
    pub fn time_until_next_knock(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.next_knock_at.map(|at| at - now)
    }
}

/// Serializes `Option<Duration>` as whole seconds.
mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
