//! The parse → reduce → publish path shared by backlog seeding and tailing.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::parser::{keys, EntryParser};
use crate::registry::SubscriptionRegistry;
use crate::types::{Event, StateSnapshot};

/// Result of ingesting one raw journal line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingested {
    /// Journal cursor of the record, if it carried one.
    pub cursor: Option<String>,
    /// The knocker event, if the record was one.
    pub event: Option<Event>,
}

/// Owns the state snapshot and feeds events into it.
///
/// The pipeline is the only writer of the snapshot; observers read it through
/// [`EventPipeline::snapshot`] or a [`watch::Receiver`].
pub struct EventPipeline {
    parser: EntryParser,
    state: watch::Sender<StateSnapshot>,
    registry: Arc<SubscriptionRegistry>,
}

impl EventPipeline {
    /// Creates a pipeline with an empty snapshot.
    #[must_use]
    pub fn new(parser: EntryParser, registry: Arc<SubscriptionRegistry>) -> Self {
        let (state, _) = watch::channel(StateSnapshot::default());
        Self {
            parser,
            state,
            registry,
        }
    }

    /// Returns the parser used for raw lines.
    #[must_use]
    pub const fn parser(&self) -> &EntryParser {
        &self.parser
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified whenever the snapshot changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<StateSnapshot> {
        self.state.subscribe()
    }

    /// Clears the snapshot back to its initial state.
    pub fn reset(&self) {
        self.state.send_replace(StateSnapshot::default());
    }

    /// Reduces `event` into the snapshot, then publishes it if asked to.
    pub fn apply(&self, event: &Event, publish: bool) {
        self.state.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            snapshot.apply(event);
            *snapshot != before
        });
        if publish {
            self.registry.publish(event);
        }
    }

    /// Parses, reduces and publishes one raw journal line.
    ///
    /// Malformed lines are logged and skipped.
    pub fn ingest_line(&self, line: &str) -> Ingested {
        let record = match EntryParser::record_from_json(line) {
            Ok(record) => record,
            Err(e) => {
                if !line.trim().is_empty() {
                    debug!(error = %e, "skipping malformed journal record");
                }
                return Ingested::default();
            }
        };

        let event = self.parser.parse_record(&record);
        if let Some(event) = &event {
            self.apply(event, true);
        }

        Ingested {
            cursor: record.get(keys::CURSOR).cloned(),
            event,
        }
    }
}
