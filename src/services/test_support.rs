//! Store double that stalls selected reads after they have been taken, so
//! tests can interleave a second write with an in-flight operation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::dao::{
    archive_store::{ArchiveStore, memory::MemoryArchiveStore},
    models::{GameEntity, MessageEntity, StarEntity, Topic},
    storage::StorageResult,
};

const STALL: Duration = Duration::from_secs(1);

pub struct StallingStore {
    inner: MemoryArchiveStore,
    listings: AtomicUsize,
    stalled_listing: Option<usize>,
    stall_lookups: AtomicBool,
    stalled: Arc<Notify>,
}

impl StallingStore {
    pub fn new(inner: MemoryArchiveStore) -> Self {
        Self {
            inner,
            listings: AtomicUsize::new(0),
            stalled_listing: None,
            stall_lookups: AtomicBool::new(false),
            stalled: Arc::new(Notify::new()),
        }
    }

    /// Stall the `nth` call (zero-based) to `list_top_games`.
    pub fn stalling_listing(mut self, nth: usize) -> Self {
        self.stalled_listing = Some(nth);
        self
    }

    /// Stall every `find_game` while enabled.
    pub fn stall_lookups(&self, enabled: bool) {
        self.stall_lookups.store(enabled, Ordering::SeqCst);
    }

    /// Number of `list_top_games` calls so far.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Resolves once a stalled read has been taken.
    pub async fn wait_for_stall(&self) {
        self.stalled.notified().await;
    }

    fn stall<T: Send + 'static>(
        &self,
        read: BoxFuture<'static, StorageResult<T>>,
        enabled: bool,
    ) -> BoxFuture<'static, StorageResult<T>> {
        let stalled = Arc::clone(&self.stalled);
        Box::pin(async move {
            let result = read.await;
            if enabled {
                stalled.notify_one();
                tokio::time::sleep(STALL).await;
            }
            result
        })
    }
}

impl ArchiveStore for StallingStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_game(game)
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let enabled = self.stall_lookups.load(Ordering::SeqCst);
        self.stall(self.inner.find_game(id), enabled)
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_game(id)
    }

    fn list_top_games(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let call = self.listings.fetch_add(1, Ordering::SeqCst);
        self.stall(
            self.inner.list_top_games(limit),
            self.stalled_listing == Some(call),
        )
    }

    fn insert_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_message(message)
    }

    fn recent_messages(
        &self,
        topic: Topic,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        self.inner.recent_messages(topic, limit)
    }

    fn delete_topic(&self, topic: Topic) -> BoxFuture<'static, StorageResult<u64>> {
        self.inner.delete_topic(topic)
    }

    fn save_star(&self, star: StarEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_star(star)
    }

    fn find_star(
        &self,
        user_id: String,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StarEntity>>> {
        self.inner.find_star(user_id, game_id)
    }

    fn delete_star(&self, user_id: String, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_star(user_id, game_id)
    }

    fn list_stars_for_user(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<StarEntity>>> {
        self.inner.list_stars_for_user(user_id)
    }

    fn delete_stars_for_game(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        self.inner.delete_stars_for_game(game_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
