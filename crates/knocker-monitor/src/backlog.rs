//! Backlog seeding from recent journal history.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::parser::EntryParser;
use crate::traits::LogQuery;
use crate::types::Event;

/// Loads the most recent knocker events once, at startup.
pub struct BacklogLoader<Q> {
    query: Arc<Q>,
    parser: EntryParser,
    unit: String,
}

impl<Q: LogQuery> BacklogLoader<Q> {
    /// Creates a loader reading `unit` through `query`.
    #[must_use]
    pub fn new(query: Arc<Q>, parser: EntryParser, unit: impl Into<String>) -> Self {
        Self {
            query,
            parser,
            unit: unit.into(),
        }
    }

    /// Fetches up to `max_records` records and returns their events oldest
    /// first.
    ///
    /// Never fails: a failed or cancelled query yields an empty vector, and
    /// malformed records are skipped.
    pub async fn load(&self, max_records: usize, cancel: &CancellationToken) -> Vec<Event> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(MonitorError::Cancelled),
            lines = self.query.query(&self.unit, max_records, cancel) => lines,
        };

        let lines = match result {
            Ok(lines) => lines,
            Err(MonitorError::Cancelled) => {
                warn!(unit = %self.unit, "backlog query cancelled, starting from empty state");
                return Vec::new();
            }
            Err(e) => {
                warn!(
                    unit = %self.unit,
                    error = %e,
                    "backlog query failed, starting from empty state"
                );
                return Vec::new();
            }
        };

        let mut skipped = 0usize;
        let mut events: Vec<Event> = lines
            .iter()
            .filter_map(|line| match self.parser.parse_line(line) {
                Ok(event) => event,
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "skipping malformed backlog record");
                    None
                }
            })
            .collect();

        sort_chronologically(&mut events);
        debug!(
            unit = %self.unit,
            records = lines.len(),
            events = events.len(),
            skipped,
            "loaded backlog"
        );
        events
    }
}

/// Sorts events by journal timestamp, oldest first.
///
/// The sort is stable. Events without a timestamp keep their relative order
/// and sort before timestamped ones.
pub fn sort_chronologically(events: &mut [Event]) {
    events.sort_by_key(|event| event.timestamp);
}
