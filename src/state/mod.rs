pub mod debounce;
pub mod live;
pub mod session;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock, watch};

use crate::{config::AppConfig, dao::archive_store::ArchiveStore, error::ServiceError};

pub use self::debounce::Debouncer;
pub use self::live::{FeedKey, LiveFeeds, Subscription};
pub use self::session::{SessionRegistry, UserIdentity};

pub type SharedState = Arc<AppState>;

/// Per-subscriber buffer of the live feed channels.
const LIVE_FEED_CAPACITY: usize = 16;

/// Central application state storing the archive handle, sessions and live feeds.
pub struct AppState {
    store: RwLock<Option<Arc<dyn ArchiveStore>>>,
    config: AppConfig,
    feeds: LiveFeeds,
    sessions: SessionRegistry,
    debouncer: Debouncer,
    degraded: watch::Sender<bool>,
    game_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let debouncer = Debouncer::new(config.send_debounce);
        let sessions = SessionRegistry::new(config.session_ttl);
        Arc::new(Self {
            store: RwLock::new(None),
            config,
            feeds: LiveFeeds::new(LIVE_FEED_CAPACITY),
            sessions,
            debouncer,
            degraded: degraded_tx,
            game_gate: Mutex::new(()),
        })
    }

    /// Obtain a handle to the current archive store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ArchiveStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`AppState::store`] but fails with [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn ArchiveStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new archive store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn ArchiveStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current archive store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Hubs backing the live game list and discussion feeds.
    pub fn feeds(&self) -> &LiveFeeds {
        &self.feeds
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Serialises writes that depend on a game's current document: star toggles,
    /// edits, deletes and posts to a game's thread.
    pub async fn lock_games(&self) -> MutexGuard<'_, ()> {
        self.game_gate.lock().await
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
