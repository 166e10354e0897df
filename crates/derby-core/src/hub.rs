//! Fan-out of announcements to connected observers.
//!
//! The hub is a registry of sinks, one bounded [`mpsc`] queue per observer.
//! Publishing serializes the event once and offers the shared
//! [`Announcement`] to every sink with `try_send`, so a publish never waits
//! on a slow or dead observer:
//!
//! - a closed sink (observer went away) is dropped from the registry;
//! - a full sink (observer lagging) skips this announcement and stays.
//!
//! Observers hold a [`Subscription`], which is a [`Stream`] of
//! announcements and unsubscribes itself on drop.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use derby_types::{EventKind, ObserverId, RaceEvent, VisitorId};
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::lobby::Lobby;

/// One serialized event, shared by every sink it is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Event kind (the stream's event name).
    pub kind: EventKind,
    /// JSON-encoded payload.
    pub data: String,
}

impl Announcement {
    /// Serialize `event`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    pub fn encode(event: &RaceEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: event.kind(),
            data: event.payload_json()?,
        })
    }
}

#[derive(Debug)]
struct Sink {
    visitor: Option<VisitorId>,
    tx: mpsc::Sender<Arc<Announcement>>,
}

/// Outcome of offering one announcement to one sink.
enum Delivery {
    Sent,
    Lagged,
    Gone,
}

impl Sink {
    fn offer(&self, announcement: Arc<Announcement>) -> Delivery {
        match self.tx.try_send(announcement) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Lagged,
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }
}

/// Registry of connected observers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sinks: Arc<Mutex<BTreeMap<ObserverId, Sink>>>,
    buffer: usize,
}

impl BroadcastHub {
    /// Create a hub whose per-observer queues hold `buffer` announcements.
    pub fn new(buffer: usize) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(BTreeMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Register an observer and queue `initial` as its first announcement.
    ///
    /// The caller builds `initial` from the current state while holding the
    /// state lock, so the observer never waits for the next event to learn
    /// where things stand.
    pub fn subscribe(&self, visitor: Option<VisitorId>, initial: &RaceEvent) -> Subscription {
        let id = ObserverId::new();
        let (tx, rx) = mpsc::channel(self.buffer);

        match Announcement::encode(initial) {
            Ok(announcement) => {
                // Fresh queue with capacity >= 1: cannot be full or closed.
                let _ = tx.try_send(Arc::new(announcement));
            }
            Err(e) => warn!(observer = %id, error = %e, "failed to encode initial snapshot"),
        }

        let count = {
            let mut sinks = self.lock();
            sinks.insert(id, Sink { visitor, tx });
            sinks.len()
        };
        debug!(observer = %id, observers = count, "observer subscribed");

        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Remove an observer. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(observer = %id, "observer unsubscribed");
        }
        removed
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Send the same announcement to every observer.
    ///
    /// Returns how many observers accepted it.
    pub fn publish(&self, event: &RaceEvent) -> usize {
        let announcement = match Announcement::encode(event) {
            Ok(a) => Arc::new(a),
            Err(e) => {
                warn!(kind = %event.kind(), error = %e, "failed to encode announcement");
                return 0;
            }
        };
        self.deliver(|_| Some(Arc::clone(&announcement)))
    }

    /// Send a lobby update, personalizing `you_joined` per observer.
    ///
    /// Returns how many observers accepted it.
    pub fn publish_lobby(&self, lobby: &Lobby, now: chrono::DateTime<chrono::Utc>) -> usize {
        let mut cache: BTreeMap<bool, Arc<Announcement>> = BTreeMap::new();
        self.deliver(|visitor| {
            let joined = visitor.is_some_and(|v| lobby.has_joined(v));
            if let Some(hit) = cache.get(&joined) {
                return Some(Arc::clone(hit));
            }
            let mut snapshot = lobby.snapshot_for(None, now);
            snapshot.you_joined = joined;
            match Announcement::encode(&RaceEvent::LobbyUpdate(snapshot)) {
                Ok(a) => {
                    let a = Arc::new(a);
                    cache.insert(joined, Arc::clone(&a));
                    Some(a)
                }
                Err(e) => {
                    warn!(error = %e, "failed to encode lobby update");
                    None
                }
            }
        })
    }

    fn deliver(
        &self,
        mut render: impl FnMut(Option<&VisitorId>) -> Option<Arc<Announcement>>,
    ) -> usize {
        let mut sinks = self.lock();
        let mut delivered: usize = 0;
        let mut gone = Vec::new();

        for (id, sink) in sinks.iter() {
            let Some(announcement) = render(sink.visitor.as_ref()) else {
                continue;
            };
            match sink.offer(announcement) {
                Delivery::Sent => delivered = delivered.saturating_add(1),
                Delivery::Lagged => debug!(observer = %id, "observer lagging, announcement skipped"),
                Delivery::Gone => gone.push(*id),
            }
        }

        for id in gone {
            sinks.remove(&id);
            debug!(observer = %id, "dropped disconnected observer");
        }

        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ObserverId, Sink>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live observer registration.
///
/// Yields announcements as a [`Stream`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    rx: mpsc::Receiver<Arc<Announcement>>,
    hub: BroadcastHub,
}

impl Subscription {
    /// This observer's id.
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next announcement. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Arc<Announcement>> {
        self.rx.recv().await
    }

    /// Take an already-queued announcement without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Announcement>> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Arc<Announcement>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
