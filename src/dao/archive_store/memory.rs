//! Process-local archive store backed by concurrent maps.
//!
//! Used when no database is configured and by the service tests. The `offline`
//! switch makes every call fail the way an unreachable backend would.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use thiserror::Error;
use uuid::Uuid;

use super::{ArchiveStore, keep_recent, rank_games};
use crate::dao::{
    models::{GameEntity, MessageEntity, StarEntity, Topic},
    storage::{StorageError, StorageResult},
};

/// Failures produced by the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("in-memory store is offline")]
    Offline,
}

#[derive(Clone, Default)]
pub struct MemoryArchiveStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    messages: DashMap<Topic, Vec<MessageEntity>>,
    stars: DashMap<(String, Uuid), StarEntity>,
    offline: AtomicBool,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the backend.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "memory store".into(),
                MemoryStoreError::Offline,
            ))
        } else {
            Ok(())
        }
    }

    fn ready<T: Send + 'static>(
        &self,
        work: impl FnOnce(&MemoryInner) -> T,
    ) -> BoxFuture<'static, StorageResult<T>> {
        let result = self.ensure_online().map(|()| work(&self.inner));
        Box::pin(future::ready(result))
    }
}

impl ArchiveStore for MemoryArchiveStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.ready(|inner| {
            inner.games.insert(game.id, game);
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.ready(|inner| inner.games.get(&id).map(|entry| entry.clone()))
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.ready(|inner| inner.games.remove(&id).is_some())
    }

    fn list_top_games(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        self.ready(|inner| {
            let mut games: Vec<_> = inner.games.iter().map(|entry| entry.clone()).collect();
            rank_games(&mut games);
            games.truncate(limit);
            games
        })
    }

    fn insert_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.ready(|inner| {
            inner
                .messages
                .entry(message.topic)
                .or_default()
                .push(message);
        })
    }

    fn recent_messages(
        &self,
        topic: Topic,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        self.ready(|inner| {
            let messages = inner
                .messages
                .get(&topic)
                .map(|entry| entry.clone())
                .unwrap_or_default();
            keep_recent(messages, limit)
        })
    }

    fn delete_topic(&self, topic: Topic) -> BoxFuture<'static, StorageResult<u64>> {
        self.ready(|inner| {
            inner
                .messages
                .remove(&topic)
                .map(|(_, messages)| messages.len() as u64)
                .unwrap_or(0)
        })
    }

    fn save_star(&self, star: StarEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.ready(|inner| {
            inner
                .stars
                .insert((star.user_id.clone(), star.game_id), star);
        })
    }

    fn find_star(
        &self,
        user_id: String,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StarEntity>>> {
        self.ready(|inner| {
            inner
                .stars
                .get(&(user_id, game_id))
                .map(|entry| entry.clone())
        })
    }

    fn delete_star(&self, user_id: String, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.ready(|inner| inner.stars.remove(&(user_id, game_id)).is_some())
    }

    fn list_stars_for_user(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<StarEntity>>> {
        self.ready(|inner| {
            inner
                .stars
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .map(|entry| entry.clone())
                .collect()
        })
    }

    fn delete_stars_for_game(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        self.ready(|inner| {
            let before = inner.stars.len();
            inner.stars.retain(|(_, starred), _| *starred != game_id);
            (before - inner.stars.len()) as u64
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.ready(|_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.ready(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::MessageBodyEntity;

    fn message(topic: Topic, offset_secs: u64) -> MessageEntity {
        MessageEntity {
            id: Uuid::new_v4(),
            topic,
            body: MessageBodyEntity::Text {
                text: format!("at {offset_secs}"),
            },
            author_id: "author".into(),
            author_avatar_url: None,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(offset_secs),
        }
    }

    #[tokio::test]
    async fn recent_messages_are_scoped_by_topic() {
        let store = MemoryArchiveStore::new();
        let game_topic = Topic::Game(Uuid::new_v4());
        store.insert_message(message(Topic::Global, 1)).await.unwrap();
        store.insert_message(message(game_topic, 2)).await.unwrap();
        store.insert_message(message(game_topic, 3)).await.unwrap();

        assert_eq!(store.recent_messages(Topic::Global, 25).await.unwrap().len(), 1);
        assert_eq!(store.recent_messages(game_topic, 25).await.unwrap().len(), 2);
        assert_eq!(store.delete_topic(game_topic).await.unwrap(), 2);
        assert!(store.recent_messages(game_topic, 25).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_messages_keeps_latest_entries_in_ascending_order() {
        let store = MemoryArchiveStore::new();
        for offset in [7, 3, 9, 1, 5] {
            store
                .insert_message(message(Topic::Global, offset))
                .await
                .unwrap();
        }

        let recent = store.recent_messages(Topic::Global, 3).await.unwrap();
        let offsets: Vec<_> = recent
            .iter()
            .map(|m| m.created_at.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs())
            .collect();
        assert_eq!(offsets, [5, 7, 9]);
    }

    #[tokio::test]
    async fn offline_store_rejects_every_call() {
        let store = MemoryArchiveStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        assert!(store.list_top_games(10).await.is_err());

        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn stars_are_keyed_by_user_and_game() {
        let store = MemoryArchiveStore::new();
        let game_id = Uuid::new_v4();
        for user in ["alice", "bob"] {
            store
                .save_star(StarEntity {
                    user_id: user.into(),
                    game_id,
                    created_at: SystemTime::now(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.list_stars_for_user("alice".into()).await.unwrap().len(), 1);
        assert!(store.delete_star("alice".into(), game_id).await.unwrap());
        assert!(!store.delete_star("alice".into(), game_id).await.unwrap());
        assert_eq!(store.delete_stars_for_game(game_id).await.unwrap(), 1);
    }
}
