//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`watch`] - Live event and state stream
//! - [`status`] - State derived from the journal backlog
//! - [`service`] - Service unit control

pub mod service;
pub mod status;
pub mod watch;

pub use service::ServiceCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;
