//! Broadcast hubs backing the live queries, one per feed.
//!
//! A hub only exists while somebody listens to it. Each [`Subscription`] owns a
//! broadcast receiver and, when dropped, prunes its hub if it was the last
//! listener. Publishing to a feed without a hub is a no-op.
//!
//! Snapshot publishers hold the hub's refresh lock from the moment they read
//! until they have published, so the last snapshot sent always reflects the
//! last write.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{
    Mutex, OwnedMutexGuard,
    broadcast::{self, error::RecvError},
};

use crate::{dao::models::Topic, dto::live::ServerEvent};

/// Identifies one live query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKey {
    /// The ranked game list.
    Games,
    /// The message feed of a discussion topic.
    Discussion(Topic),
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKey::Games => f.write_str("games"),
            FeedKey::Discussion(topic) => write!(f, "discussion:{topic}"),
        }
    }
}

/// Simple broadcast hub wrapper used by the live services.
pub struct LiveHub {
    sender: broadcast::Sender<ServerEvent>,
    refresh: Arc<Mutex<()>>,
}

impl LiveHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            refresh: Arc::new(Mutex::new(())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// Registry of the hubs that currently have listeners.
pub struct LiveFeeds {
    hubs: Arc<DashMap<FeedKey, LiveHub>>,
    capacity: usize,
}

impl LiveFeeds {
    /// Build an empty registry whose hubs buffer `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new listener on `key`, creating the hub when needed.
    pub fn subscribe(&self, key: FeedKey) -> Subscription {
        // The entry guard is held while subscribing so a concurrent prune cannot
        // remove the hub between lookup and registration.
        let receiver = self
            .hubs
            .entry(key)
            .or_insert_with(|| LiveHub::new(self.capacity))
            .subscribe();

        Subscription {
            key,
            receiver: Some(receiver),
            hubs: Arc::clone(&self.hubs),
        }
    }

    /// Take the refresh lock of `key`, or `None` when nobody listens to it.
    ///
    /// Holders read the data behind the feed and publish it before releasing
    /// the guard, so concurrent refreshes publish in the order they read.
    pub async fn lock_refresh(&self, key: FeedKey) -> Option<OwnedMutexGuard<()>> {
        let refresh = self.hubs.get(&key).map(|hub| Arc::clone(&hub.refresh))?;
        Some(refresh.lock_owned().await)
    }

    /// Fan `event` out to the listeners of `key`, if any.
    pub fn publish(&self, key: FeedKey, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(&key) {
            hub.broadcast(event);
        }
    }

    /// Whether `key` currently has at least one listener.
    pub fn has_subscribers(&self, key: FeedKey) -> bool {
        self.hubs.contains_key(&key)
    }

    /// Number of feeds with live listeners.
    pub fn active_feeds(&self) -> usize {
        self.hubs.len()
    }
}

/// A live query handle. Dropping it stops delivery and releases the feed.
pub struct Subscription {
    key: FeedKey,
    receiver: Option<broadcast::Receiver<ServerEvent>>,
    hubs: Arc<DashMap<FeedKey, LiveHub>>,
}

impl Subscription {
    /// Feed this subscription listens to.
    pub fn key(&self) -> FeedKey {
        self.key
    }

    /// Wait for the next event published on the feed.
    pub async fn recv(&mut self) -> Result<ServerEvent, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release our receiver first so the count only sees other listeners.
        drop(self.receiver.take());
        self.hubs
            .remove_if(&self.key, |_, hub| hub.sender.receiver_count() == 0);
    }
}
