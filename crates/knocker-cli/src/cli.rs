//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use knocker_monitor::EventKind;

/// Watch and control the knocker port-knocking service.
#[derive(Parser, Debug, Clone)]
#[command(name = "knocker-watch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Monitor configuration file (JSON).
    #[arg(short, long, env = "KNOCKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Systemd unit to follow, overriding the configuration file.
    #[arg(short, long, env = "KNOCKER_UNIT")]
    pub unit: Option<String>,

    /// Treat the unit as a system unit instead of a user unit.
    #[arg(long)]
    pub system: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Follow the journal and print events and state changes until Ctrl-C.
    Watch(WatchArgs),

    /// Show the state derived from recent journal history.
    Status,

    /// Control the knocker service.
    Service {
        /// Service subcommand to execute.
        #[command(subcommand)]
        command: ServiceCommands,
    },
}

/// Options for the `watch` subcommand.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    /// Reprint the status every N seconds so countdowns stay current.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

    /// Start the service unit if it is not already active.
    #[arg(long)]
    pub auto_start: bool,

    /// Only print events of this kind (repeatable). Status lines are always
    /// printed.
    #[arg(long = "kind", value_name = "KIND", value_parser = parse_event_kind)]
    pub kinds: Vec<EventKind>,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            refresh_secs: 10,
            auto_start: false,
            kinds: Vec::new(),
        }
    }
}

fn parse_event_kind(value: &str) -> Result<EventKind, String> {
    value.parse().map_err(|_| {
        let known: Vec<_> = EventKind::ALL.iter().map(EventKind::as_str).collect();
        format!("expected one of {}", known.join(", "))
    })
}

/// Service subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommands {
    /// Start the service unit.
    Start,
    /// Stop the service unit.
    Stop,
    /// Show whether the CLI is installed and the unit active.
    Status,
    /// Trigger a manual knock.
    Knock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_with_defaults() {
        let cli = Cli::parse_from(["knocker-watch", "watch"]);
        assert!(matches!(
            cli.command,
            Commands::Watch(ref args) if *args == WatchArgs::default()
        ));
        assert_eq!(cli.format, Format::Table);
        assert!(!cli.system);
        assert!(!cli.log_json);
    }

    #[test]
    fn parses_global_flags() {
        let cli = Cli::parse_from([
            "knocker-watch",
            "--unit",
            "knocker-dev.service",
            "--system",
            "--format",
            "json",
            "status",
        ]);
        assert_eq!(cli.unit.as_deref(), Some("knocker-dev.service"));
        assert!(cli.system);
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn parses_watch_options() {
        let cli = Cli::parse_from([
            "knocker-watch",
            "watch",
            "--refresh-secs",
            "30",
            "--auto-start",
            "--kind",
            "Error",
            "--kind",
            "WhitelistApplied",
        ]);
        let Commands::Watch(args) = cli.command else {
            unreachable!("expected watch command");
        };
        assert_eq!(args.refresh_secs, 30);
        assert!(args.auto_start);
        assert_eq!(args.kinds, vec![EventKind::Error, EventKind::WhitelistApplied]);
    }

    #[test]
    fn rejects_unknown_event_kind_and_zero_refresh() {
        assert!(Cli::try_parse_from(["knocker-watch", "watch", "--kind", "Reboot"]).is_err());
        assert!(Cli::try_parse_from(["knocker-watch", "watch", "--refresh-secs", "0"]).is_err());
    }

    #[test]
    fn parses_service_knock() {
        let cli = Cli::parse_from(["knocker-watch", "service", "knock"]);
        match cli.command {
            Commands::Service { command } => assert_eq!(command, ServiceCommands::Knock),
            other => unreachable!("expected service command, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_service_action() {
        assert!(Cli::try_parse_from(["knocker-watch", "service", "restart"]).is_err());
    }
}
