//! Traits for the monitor's external collaborators.
//!
//! - [`LogQuery`]: one-shot fetch of recent journal records
//! - [`LogSource`] / [`LogReader`]: continuous read of new journal records
//! - [`ServiceControl`]: start/stop/status of the knocker service
//!
//! The journalctl/systemctl implementations live in [`crate::journal`] and
//! [`crate::service`]; tests substitute in-memory fakes.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Fetches a bounded window of historical journal records.
pub trait LogQuery: Send + Sync {
    /// Returns up to `max_records` raw JSON lines for `unit`.
    ///
    /// Lines may come back in any order; callers sort them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::Query`] if the journal cannot be queried,
    /// or [`crate::MonitorError::Cancelled`] if `cancel` fires first.
    fn query(
        &self,
        unit: &str,
        max_records: usize,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Opens continuous reads of new journal records.
pub trait LogSource: Send + Sync {
    /// Reader produced by [`LogSource::open`].
    type Reader: LogReader;

    /// Opens a stream of records for `unit`.
    ///
    /// With `after_cursor`, the stream starts right after that journal
    /// position; otherwise it starts at the live tail.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::StreamOpen`] if the stream cannot be opened.
    fn open(
        &self,
        unit: &str,
        after_cursor: Option<&str>,
    ) -> impl Future<Output = Result<Self::Reader>> + Send;
}

/// An open stream of raw journal lines.
pub trait LogReader: Send {
    /// Waits for the next line.
    ///
    /// Returns `Ok(None)` when the producer closed the stream. The returned
    /// future must be safe to drop before completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::StreamRead`] on a read failure.
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Releases the stream. Further reads are not issued.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Controls the knocker service. Every operation reports plain success.
pub trait ServiceControl: Send + Sync {
    /// Whether the knocker CLI is installed.
    fn is_installed(&self) -> impl Future<Output = bool> + Send;

    /// Whether the service unit is active.
    fn is_active(&self) -> impl Future<Output = bool> + Send;

    /// Starts the service unit.
    fn start(&self) -> impl Future<Output = bool> + Send;

    /// Stops the service unit.
    fn stop(&self) -> impl Future<Output = bool> + Send;

    /// Triggers a manual knock.
    fn trigger_knock(&self) -> impl Future<Output = bool> + Send;
}
