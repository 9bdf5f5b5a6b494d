//! # knocker-monitor
//!
//! Journal-tailing state monitor for the knocker port-knocking service.
//!
//! The knocker service writes structured records (`KNOCKER_EVENT=...`) to the
//! systemd journal. This crate turns them into typed events, folds them into a
//! live state snapshot and dispatches them to subscribers.
//!
//! This crate provides:
//!
//! - [`Event`], [`EventKind`]: typed knocker journal events
//! - [`EntryParser`]: journal JSON records to events
//! - [`StateSnapshot`], [`reduce`]: the aggregate state and its reducer
//! - [`BacklogLoader`]: one-shot seeding from recent history
//! - [`TailFollower`]: reconnecting follower of new records
//! - [`SubscriptionRegistry`], [`EventStream`]: callback and stream delivery
//! - [`Monitor`]: the façade tying it all together
//! - [`JournalctlQuery`], [`JournalctlSource`], [`SystemdService`]: the
//!   `journalctl`/`systemctl` collaborators
//!
//! ## Example
//!
//! ```rust
//! use knocker_monitor::{EntryParser, EventKind, StateSnapshot};
//!
//! let parser = EntryParser::new();
//! let line = r#"{"KNOCKER_EVENT":"WhitelistApplied","KNOCKER_SCHEMA_VERSION":"1",
//!                "KNOCKER_WHITELIST_IP":"192.0.2.10","KNOCKER_TTL_SEC":"3600"}"#;
//!
//! let event = parser.parse_line(line).ok().flatten();
//! assert_eq!(event.as_ref().map(|e| e.kind), Some(EventKind::WhitelistApplied));
//!
//! let mut state = StateSnapshot::default();
//! if let Some(event) = &event {
//!     state.apply(event);
//! }
//! assert_eq!(state.whitelist_ip.as_deref(), Some("192.0.2.10"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backlog;
pub mod config;
pub mod error;
pub mod follower;
pub mod journal;
pub mod monitor;
pub mod parser;
pub mod pipeline;
pub mod reducer;
pub mod registry;
pub mod service;
pub mod traits;
pub mod types;

// Re-export main types
pub use backlog::{sort_chronologically, BacklogLoader};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use follower::{AtomicFollowerState, BackoffPolicy, FollowerState, TailFollower};
pub use journal::{JournalReader, JournalctlQuery, JournalctlSource};
pub use monitor::Monitor;
pub use parser::{EntryParser, RawRecord, SCHEMA_VERSION};
pub use pipeline::{EventPipeline, Ingested};
pub use reducer::{fold, reduce};
pub use registry::{BoxError, DispatchReport, EventStream, SubscriptionId, SubscriptionRegistry};
pub use service::SystemdService;
pub use traits::{LogQuery, LogReader, LogSource, ServiceControl};
pub use types::{CadenceSource, Event, EventFields, EventKind, ServiceState, StateSnapshot};
