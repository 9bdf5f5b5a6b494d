//! The monitor façade: backlog seeding, tailing, state and subscriptions.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backlog::BacklogLoader;
use crate::config::MonitorConfig;
use crate::follower::{FollowerState, TailFollower};
use crate::journal::{JournalctlQuery, JournalctlSource};
use crate::parser::EntryParser;
use crate::pipeline::EventPipeline;
use crate::registry::{BoxError, EventStream, SubscriptionId, SubscriptionRegistry};
use crate::traits::{LogQuery, LogSource};
use crate::types::{Event, EventKind, StateSnapshot};

struct Running {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Monitors the knocker journal and keeps a live [`StateSnapshot`].
///
/// # Example
///
/// ```no_run
/// use knocker_monitor::{EventKind, Monitor, MonitorConfig};
///
/// # async fn example() {
/// let monitor = Monitor::journald(MonitorConfig::default());
/// monitor.subscribe(EventKind::WhitelistApplied, |event| {
///     println!("whitelisted {:?}", event.fields.whitelist_ip);
///     Ok(())
/// });
/// monitor.start().await;
/// println!("{:?}", monitor.state());
/// monitor.stop().await;
/// # }
/// ```
pub struct Monitor<Q, S> {
    config: MonitorConfig,
    backlog: BacklogLoader<Q>,
    follower: Arc<TailFollower<S>>,
    pipeline: Arc<EventPipeline>,
    registry: Arc<SubscriptionRegistry>,
    running: Mutex<Option<Running>>,
}

impl Monitor<JournalctlQuery, JournalctlSource> {
    /// Creates a monitor reading the systemd journal through `journalctl`.
    #[must_use]
    pub fn journald(config: MonitorConfig) -> Self {
        let query = JournalctlQuery::new(config.user_scope);
        let source = JournalctlSource::new(config.user_scope);
        Self::new(config, query, source)
    }
}

impl<Q, S> Monitor<Q, S>
where
    Q: LogQuery + 'static,
    S: LogSource + 'static,
{
    /// Creates a stopped monitor over the given collaborators.
    #[must_use]
    pub fn new(config: MonitorConfig, query: Q, source: S) -> Self {
        let parser = EntryParser::with_schema_version(config.schema_version.clone());
        let registry = Arc::new(SubscriptionRegistry::new());
        let pipeline = Arc::new(EventPipeline::new(parser.clone(), Arc::clone(&registry)));
        let backlog = BacklogLoader::new(Arc::new(query), parser, config.unit.clone());
        let follower = Arc::new(TailFollower::new(
            Arc::new(source),
            Arc::clone(&pipeline),
            config.unit.clone(),
            config.backoff(),
        ));

        Self {
            config,
            backlog,
            follower,
            pipeline,
            registry,
            running: Mutex::new(None),
        }
    }

    /// Seeds the snapshot from the backlog and starts tailing.
    ///
    /// Does nothing if the monitor is already running. A [`Monitor::stop`]
    /// issued while the backlog is loading cancels the start.
    pub async fn start(&self) {
        let cancel = {
            let mut running = self.running.lock();
            if running.is_some() {
                debug!(unit = %self.config.unit, "monitor already running");
                return;
            }
            let cancel = CancellationToken::new();
            *running = Some(Running {
                cancel: cancel.clone(),
                handle: None,
            });
            self.pipeline.reset();
            cancel
        };

        info!(unit = %self.config.unit, "starting knocker monitor");
        let events = self
            .backlog
            .load(self.config.backlog_records, &cancel)
            .await;

        // Subscribers may call back into the monitor, so no lock is held here.
        for event in &events {
            if cancel.is_cancelled() {
                break;
            }
            self.pipeline.apply(event, self.config.replay_backlog);
        }

        let mut running = self.running.lock();
        if cancel.is_cancelled() {
            debug!(unit = %self.config.unit, "monitor stopped during backlog seeding");
            return;
        }

        let cursor = events.iter().rev().find_map(|event| event.cursor.clone());
        info!(
            unit = %self.config.unit,
            events = events.len(),
            resume_cursor = ?cursor,
            "seeded state from backlog"
        );

        let follower = Arc::clone(&self.follower);
        let follower_cancel = cancel.clone();
        let handle = tokio::spawn(async move { follower.run(cursor, follower_cancel).await });
        if let Some(running) = running.as_mut() {
            running.handle = Some(handle);
        }
    }

    /// Stops tailing and waits for the follower task to finish.
    ///
    /// No subscriber callback runs after this returns. Does nothing if the
    /// monitor is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.cancel.cancel();
        if let Some(handle) = running.handle {
            if let Err(e) = handle.await {
                warn!(unit = %self.config.unit, error = %e, "tail follower task failed");
            }
        }
        info!(unit = %self.config.unit, "knocker monitor stopped");
    }
}

impl<Q, S> Monitor<Q, S> {
    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn state(&self) -> StateSnapshot {
        self.pipeline.snapshot()
    }

    /// Returns a receiver notified whenever the snapshot changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<StateSnapshot> {
        self.pipeline.watch()
    }

    /// Whether the monitor has been started and not stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Returns the shared subscription registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Registers `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.registry.subscribe(kind, callback)
    }

    /// Registers `callback` for every event kind.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.registry.subscribe_all(callback)
    }

    /// Removes a registration.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Returns a stream of every event published from now on.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.registry.events()
    }
}

impl<Q, S: LogSource> Monitor<Q, S> {
    /// Returns the tail follower's current state.
    #[must_use]
    pub fn follower_state(&self) -> FollowerState {
        self.follower.state()
    }
}

impl<Q, S> Drop for Monitor<Q, S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}
