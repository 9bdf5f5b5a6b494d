//! Publish/subscribe fan-out of knocker events.
//!
//! This module provides:
//! - [`SubscriptionRegistry`]: Per-kind callback lists with ordered dispatch
//! - [`EventStream`]: Async stream of every published event

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_util::sync::ReusableBoxFuture;
use tracing::{error, warn};

use crate::error::MonitorError;
use crate::types::{Event, EventKind};

/// Error type subscriber callbacks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&Event) -> Result<(), BoxError> + Send + Sync>;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    callback: Callback,
}

/// Outcome of one [`SubscriptionRegistry::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks that returned `Ok`.
    pub delivered: usize,
    /// Callbacks that returned an error or panicked.
    pub failed: usize,
}

/// Registry of event callbacks, keyed by event kind.
///
/// Callbacks for a kind run in registration order. Dispatch works on a copy of
/// the callback list taken before the first callback runs, so subscribing or
/// unsubscribing (even from inside a callback) only affects later publishes.
pub struct SubscriptionRegistry {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<Event>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Default capacity of the [`EventStream`] channel.
    pub const STREAM_CAPACITY: usize = 256;

    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(Self::STREAM_CAPACITY);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stream,
        }
    }

    /// Registers `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register(&[kind], Arc::new(callback))
    }

    /// Registers `callback` for every event kind under a single handle.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register(&EventKind::ALL, Arc::new(callback))
    }

    fn register(&self, kinds: &[EventKind], callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.write();
        for kind in kinds {
            subscribers.entry(*kind).or_default().push(Subscription {
                id,
                callback: Arc::clone(&callback),
            });
        }
        id
    }

    /// Removes a registration. Returns false if the handle was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Number of callbacks registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Returns an async stream of every event published from now on.
    #[must_use]
    pub fn events(&self) -> EventStream {
        EventStream::new(self.stream.subscribe())
    }

    /// Invokes every callback registered for `event.kind`.
    ///
    /// A failing callback is logged and does not prevent the remaining ones
    /// from running.
    pub fn publish(&self, event: &Event) -> DispatchReport {
        let callbacks: Vec<Subscription> = self
            .subscribers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for subscription in callbacks {
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscription.callback)(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    let err = MonitorError::Subscriber(e.to_string());
                    warn!(
                        event = %event.kind,
                        subscription = ?subscription.id,
                        error = %err,
                        "subscriber callback failed"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    let err = MonitorError::Subscriber(panic_message(panic.as_ref()));
                    error!(
                        event = %event.kind,
                        subscription = ?subscription.id,
                        error = %err,
                        "subscriber callback panicked"
                    );
                }
            }
        }

        // No receivers is fine.
        let _ = self.stream.send(event.clone());
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

type Recv = (
    Result<Event, broadcast::error::RecvError>,
    broadcast::Receiver<Event>,
);

async fn recv(mut receiver: broadcast::Receiver<Event>) -> Recv {
    let result = receiver.recv().await;
    (result, receiver)
}

/// Async stream of published events.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// oldest events and logs how many were dropped.
pub struct EventStream {
    pending: ReusableBoxFuture<'static, Recv>,
    closed: bool,
}

impl EventStream {
    fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self {
            pending: ReusableBoxFuture::new(recv(receiver)),
            closed: false,
        }
    }

    /// Receives the next event, or `None` once the registry is gone.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.next().await
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.closed {
                return Poll::Ready(None);
            }

            let (result, receiver) = ready!(self.pending.poll(cx));
            self.pending.set(recv(receiver));

            match result {
                Ok(event) => return Poll::Ready(Some(event)),
                Err(broadcast::error::RecvError::Closed) => self.closed = true,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, dropping events");
                }
            }
        }
    }
}
