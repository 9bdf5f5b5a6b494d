//! Error types for the knocker monitor.

use thiserror::Error;

/// Errors that can occur while monitoring the knocker journal.
///
/// None of these are fatal to the host process: record-level errors are
/// skipped, stream errors trigger a reconnect, and query errors degrade the
/// seeded snapshot.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A single journal record could not be interpreted as structured data.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A record advertised a schema version other than the supported one.
    #[error("schema version mismatch: expected {expected}, found {found:?}")]
    SchemaVersionMismatch {
        /// The version this parser understands.
        expected: String,
        /// The version carried by the record, if any.
        found: Option<String>,
    },

    /// The live log stream could not be opened.
    #[error("failed to open log stream: {0}")]
    StreamOpen(String),

    /// Reading from an open log stream failed.
    #[error("failed to read log stream: {0}")]
    StreamRead(String),

    /// The backlog query failed.
    #[error("backlog query failed: {0}")]
    Query(String),

    /// A subscriber callback returned an error or panicked.
    #[error("subscriber failed: {0}")]
    Subscriber(String),

    /// The operation was cancelled by a stop request.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Returns true if the error should trigger a reconnect rather than be
    /// reported upward.
    #[must_use]
    pub const fn is_recoverable_stream_error(&self) -> bool {
        matches!(self, Self::StreamOpen(_) | Self::StreamRead(_))
    }
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
