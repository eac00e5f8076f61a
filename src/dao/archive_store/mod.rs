#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::cmp::Reverse;

use crate::dao::models::{GameEntity, MessageEntity, StarEntity, Topic};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for games, discussion feeds and stars.
///
/// Writes are single-document; no operation spans several documents atomically.
pub trait ArchiveStore: Send + Sync {
    /// Insert or fully replace a game document.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Delete a game document, returning whether it existed.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Games ordered by star count descending (see [`rank_games`]), capped to `limit`.
    fn list_top_games(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    fn insert_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// The `limit` most recent messages of a topic, in creation-time ascending order.
    fn recent_messages(
        &self,
        topic: Topic,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>>;
    /// Remove every message of a topic, returning how many were deleted.
    fn delete_topic(&self, topic: Topic) -> BoxFuture<'static, StorageResult<u64>>;
    fn save_star(&self, star: StarEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_star(
        &self,
        user_id: String,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StarEntity>>>;
    /// Delete a star membership, returning whether it existed.
    fn delete_star(&self, user_id: String, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_stars_for_user(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<Vec<StarEntity>>>;
    fn delete_stars_for_game(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Order games for the list view: most stars first, then oldest first, then by id.
pub fn rank_games(games: &mut [GameEntity]) {
    games.sort_by_key(|game| (Reverse(game.stars), game.created_at, game.id));
}

/// Keep the `limit` most recent messages and return them oldest first.
pub fn keep_recent(mut messages: Vec<MessageEntity>, limit: usize) -> Vec<MessageEntity> {
    messages.sort_by_key(MessageEntity::feed_order);
    let overflow = messages.len().saturating_sub(limit);
    messages.drain(..overflow);
    messages
}
