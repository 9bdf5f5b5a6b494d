//! CLI error types.

use knocker_monitor::MonitorError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A service action did not succeed.
    #[error("command error: {0}")]
    Command(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// Error from the monitor library.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
