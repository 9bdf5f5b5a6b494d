//! Watch command implementation.
//!
//! Starts the monitor and prints events and state changes until the shutdown
//! future resolves. The status line is also reprinted on a fixed period so
//! the remaining-time countdowns stay current between events.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use knocker_monitor::{
    Event, EventKind, EventStream, LogQuery, LogSource, Monitor, ServiceControl, StateSnapshot,
};

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::{describe_event, OutputFormat, StatusView};

/// One line of the watch stream in JSON output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum WatchRecord<'a> {
    Event(&'a Event),
    Status(&'a StatusView),
}

/// Watch command executor.
pub struct WatchCommand<Q, S, C> {
    monitor: Monitor<Q, S>,
    control: C,
    refresh: Duration,
    auto_start: bool,
    kinds: Vec<EventKind>,
}

impl<Q, S, C> WatchCommand<Q, S, C>
where
    Q: LogQuery + 'static,
    S: LogSource + 'static,
    C: ServiceControl,
{
    /// Create a watch command driving `monitor`, using `control` for the
    /// installation check and auto-start.
    #[must_use]
    pub fn new(monitor: Monitor<Q, S>, control: C, args: &WatchArgs) -> Self {
        Self {
            monitor,
            control,
            refresh: Duration::from_secs(args.refresh_secs.max(1)),
            auto_start: args.auto_start,
            kinds: args.kinds.clone(),
        }
    }

    /// Execute the watch command until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if knocker is not installed or output fails. The
    /// monitor is stopped either way.
    pub async fn execute<W, F>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        shutdown: F,
    ) -> Result<(), CliError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        if !self.control.is_installed().await {
            return Err(CliError::Command("knocker is not installed".to_string()));
        }

        let mut events = self.monitor.events();
        let mut state = self.monitor.watch_state();

        self.monitor.start().await;
        if self.auto_start {
            self.ensure_service_active().await;
        }
        let result = self
            .stream(writer, format, &mut events, &mut state, shutdown)
            .await;
        self.monitor.stop().await;
        info!(unit = %self.monitor.config().unit, "watch finished");
        result
    }

    async fn ensure_service_active(&self) {
        let unit = &self.monitor.config().unit;
        if self.control.is_active().await {
            return;
        }
        if self.control.start().await {
            info!(unit = %unit, "auto-started service");
        } else {
            warn!(unit = %unit, "failed to auto-start service");
        }
    }

    fn is_shown(&self, event: &Event) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind)
    }

    async fn stream<W, F>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        events: &mut EventStream,
        state: &mut watch::Receiver<StateSnapshot>,
        shutdown: F,
    ) -> Result<(), CliError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        write_status(writer, format, state.borrow_and_update().clone())?;

        let mut refresh = tokio::time::interval_at(Instant::now() + self.refresh, self.refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => return Ok(()),
                event = events.next() => {
                    let Some(event) = event else { return Ok(()) };
                    if self.is_shown(&event) {
                        let text = describe_event(&event);
                        format.write_line(writer, &WatchRecord::Event(&event), &text)?;
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    write_status(writer, format, state.borrow_and_update().clone())?;
                    refresh.reset();
                }
                _ = refresh.tick() => {
                    write_status(writer, format, state.borrow().clone())?;
                }
            }
        }
    }
}

fn write_status<W: Write>(
    writer: &mut W,
    format: &OutputFormat,
    snapshot: StateSnapshot,
) -> Result<(), CliError> {
    let view = StatusView::new(snapshot, Utc::now());
    format.write_line(writer, &WatchRecord::Status(&view), &view.one_line())
}
