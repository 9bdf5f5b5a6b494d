//! # knocker-cli
//!
//! Terminal front end for the knocker journal monitor, shipped as the
//! `knocker-watch` binary.
//!
//! Provides commands for:
//! - Watching knocker events and state changes live
//! - Printing the state derived from recent journal history
//! - Starting, stopping and querying the service unit, and triggering knocks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, ServiceCommands, WatchArgs};
pub use error::CliError;
pub use output::OutputFormat;

use knocker_monitor::MonitorConfig;

/// Builds the monitor configuration from the file and command-line overrides.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded or the result
/// is invalid.
pub fn load_config(cli: &Cli) -> Result<MonitorConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(unit) = &cli.unit {
        config.unit.clone_from(unit);
    }
    if cli.system {
        config.user_scope = false;
    }

    config.validate()?;
    Ok(config)
}
