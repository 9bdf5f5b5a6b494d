//! Continuous tailing of the journal with reconnect and backoff.
//!
//! The follower is an explicit state machine:
//!
//! ```text
//! Idle → Connecting → Streaming ─(end of stream / read error)─┐
//!            ↑   └─(open error)─→ Backoff ←──────────────────┘
//!            └──────────────────────┘
//! any state ─(cancel)→ Stopped
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::pipeline::EventPipeline;
use crate::traits::{LogReader, LogSource};

/// State of the tail follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    /// Not started yet.
    Idle,
    /// Opening the journal stream.
    Connecting,
    /// Reading records from an open stream.
    Streaming,
    /// Waiting before the next connection attempt.
    Backoff,
    /// Stopped by request; terminal.
    Stopped,
}

/// Atomic cell holding a [`FollowerState`].
#[derive(Debug)]
pub struct AtomicFollowerState(AtomicU8);

impl AtomicFollowerState {
    /// Creates a cell holding `state`.
    #[must_use]
    pub const fn new(state: FollowerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Loads the current state.
    #[must_use]
    pub fn load(&self) -> FollowerState {
        match self.0.load(Ordering::SeqCst) {
            0 => FollowerState::Idle,
            1 => FollowerState::Connecting,
            2 => FollowerState::Streaming,
            3 => FollowerState::Backoff,
            _ => FollowerState::Stopped,
        }
    }

    /// Stores a new state.
    pub fn store(&self, state: FollowerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Retry delays of the follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the stream could not be opened.
    pub open_failure: Duration,
    /// Delay after the stream ended or failed while reading.
    pub stream_end: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            open_failure: Duration::from_secs(5),
            stream_end: Duration::from_secs(2),
        }
    }
}

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(MonitorError),
}

/// Follows a journal unit and feeds every new record into the pipeline.
pub struct TailFollower<S> {
    source: Arc<S>,
    pipeline: Arc<EventPipeline>,
    unit: String,
    backoff: BackoffPolicy,
    state: Arc<AtomicFollowerState>,
}

impl<S: LogSource> TailFollower<S> {
    /// Creates a follower for `unit`.
    #[must_use]
    pub fn new(
        source: Arc<S>,
        pipeline: Arc<EventPipeline>,
        unit: impl Into<String>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            source,
            pipeline,
            unit: unit.into(),
            backoff,
            state: Arc::new(AtomicFollowerState::new(FollowerState::Idle)),
        }
    }

    /// Returns a shared handle to the follower's state cell.
    #[must_use]
    pub fn state_handle(&self) -> Arc<AtomicFollowerState> {
        Arc::clone(&self.state)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> FollowerState {
        self.state.load()
    }

    /// Runs until `cancel` fires.
    ///
    /// `cursor` is the journal position already processed (for example the
    /// last backlog record); streaming resumes right after it.
    pub async fn run(&self, mut cursor: Option<String>, cancel: CancellationToken) {
        info!(unit = %self.unit, "tail follower started");

        while !cancel.is_cancelled() {
            self.state.store(FollowerState::Connecting);
            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                opened = self.source.open(&self.unit, cursor.as_deref()) => opened,
            };

            let delay = match opened {
                Err(e) => {
                    warn!(
                        unit = %self.unit,
                        error = %e,
                        retry_in = ?self.backoff.open_failure,
                        "failed to open journal stream"
                    );
                    self.backoff.open_failure
                }
                Ok(mut reader) => {
                    self.state.store(FollowerState::Streaming);
                    debug!(unit = %self.unit, after_cursor = ?cursor, "journal stream open");

                    let end = self.stream(&mut reader, &mut cursor, &cancel).await;
                    reader.close().await;

                    match end {
                        StreamEnd::Cancelled => break,
                        StreamEnd::Closed => {
                            info!(
                                unit = %self.unit,
                                retry_in = ?self.backoff.stream_end,
                                "journal stream ended"
                            );
                        }
                        StreamEnd::Failed(e) => {
                            warn!(
                                unit = %self.unit,
                                error = %e,
                                recoverable = e.is_recoverable_stream_error(),
                                retry_in = ?self.backoff.stream_end,
                                "journal stream read failed"
                            );
                        }
                    }
                    self.backoff.stream_end
                }
            };

            self.state.store(FollowerState::Backoff);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        self.state.store(FollowerState::Stopped);
        info!(unit = %self.unit, "tail follower stopped");
    }

    async fn stream(
        &self,
        reader: &mut S::Reader,
        cursor: &mut Option<String>,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                next = reader.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    let ingested = self.pipeline.ingest_line(&line);
                    if ingested.cursor.is_some() {
                        *cursor = ingested.cursor;
                    }
                }
                Ok(None) => return StreamEnd::Closed,
                Err(e) => return StreamEnd::Failed(e),
            }
        }
    }
}
