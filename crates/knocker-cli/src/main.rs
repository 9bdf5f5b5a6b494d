//! knocker-watch - terminal front end for the knocker journal monitor.

use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use knocker_cli::commands::{ServiceCommand, StatusCommand, WatchCommand};
use knocker_cli::{load_config, Cli, Commands, OutputFormat};
use knocker_monitor::{JournalctlQuery, Monitor, SystemdService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let (text, json) = if cli.log_json {
        (None, Some(fmt::layer().json().with_writer(io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(
            EnvFilter::from_default_env()
                .add_directive("knocker_monitor=info".parse()?)
                .add_directive("knocker_cli=info".parse()?)
                .add_directive("knocker_watch=info".parse()?),
        )
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli).context("failed to load monitor configuration")?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout();

    match cli.command {
        Commands::Watch(args) => {
            info!(unit = %config.unit, user_scope = config.user_scope, "watching knocker journal");
            let control = SystemdService::new(config.unit.clone(), config.user_scope);
            let command = WatchCommand::new(Monitor::journald(config), control, &args);
            command.execute(&mut stdout, &format, shutdown_signal()).await?;
        }
        Commands::Status => {
            let query = JournalctlQuery::new(config.user_scope);
            StatusCommand::new(&config, query)
                .execute(&mut stdout, &format)
                .await?;
        }
        Commands::Service { command } => {
            let control = SystemdService::new(config.unit.clone(), config.user_scope);
            ServiceCommand::new(control, config.unit)
                .execute(&mut stdout, &format, command)
                .await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("received Ctrl-C, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_fails_before_running() {
        let cli = Cli::parse_from(["knocker-watch", "--unit", " ", "status"]);
        let err = run(cli).await.expect_err("invalid unit");
        assert!(format!("{err:#}").contains("unit cannot be empty"));
    }
}
