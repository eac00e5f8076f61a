use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        GAME_COLLECTION_NAME, MESSAGE_COLLECTION_NAME, MongoGameDocument, MongoMessageDocument,
        MongoStarDocument, STAR_COLLECTION_NAME, doc_id, star_filter, topic_filter,
    },
};
use crate::dao::{
    archive_store::ArchiveStore,
    models::{GameEntity, MessageEntity, StarEntity, Topic},
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MongoArchiveStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = self.config.open_database().await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

impl MongoArchiveStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open_database().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let indexes = [
            (
                GAME_COLLECTION_NAME,
                "game_rank_idx",
                doc! {"stars": -1, "created_at": 1},
                false,
            ),
            (
                MESSAGE_COLLECTION_NAME,
                "message_topic_idx",
                doc! {"topic": 1, "created_at": -1},
                false,
            ),
            (
                STAR_COLLECTION_NAME,
                "star_member_idx",
                doc! {"user_id": 1, "game_id": 1},
                true,
            ),
        ];

        for (collection, name, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database().await.collection(GAME_COLLECTION_NAME)
    }

    async fn messages(&self) -> Collection<MongoMessageDocument> {
        self.database().await.collection(MESSAGE_COLLECTION_NAME)
    }

    async fn stars(&self) -> Collection<MongoStarDocument> {
        self.database().await.collection(STAR_COLLECTION_NAME)
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        self.games()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| write_error(GAME_COLLECTION_NAME, source))?;
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| read_error(GAME_COLLECTION_NAME, source))?;

        document.map(GameEntity::try_from).transpose()
    }

    async fn delete_game(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .games()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| write_error(GAME_COLLECTION_NAME, source))?;
        Ok(result.deleted_count > 0)
    }

    async fn list_top_games(&self, limit: usize) -> MongoResult<Vec<GameEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .games()
            .await
            .find(doc! {})
            .sort(doc! {"stars": -1, "created_at": 1, "_id": 1})
            .limit(limit as i64)
            .await
            .map_err(|source| read_error(GAME_COLLECTION_NAME, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(GAME_COLLECTION_NAME, source))?;

        documents.into_iter().map(GameEntity::try_from).collect()
    }

    async fn insert_message(&self, message: MessageEntity) -> MongoResult<()> {
        let document: MongoMessageDocument = message.into();
        self.messages()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| write_error(MESSAGE_COLLECTION_NAME, source))?;
        Ok(())
    }

    async fn recent_messages(&self, topic: Topic, limit: usize) -> MongoResult<Vec<MessageEntity>> {
        // Newest first so the limit keeps the most recent page, then flip for display.
        let documents: Vec<MongoMessageDocument> = self
            .messages()
            .await
            .find(topic_filter(topic))
            .sort(doc! {"created_at": -1, "_id": -1})
            .limit(limit as i64)
            .await
            .map_err(|source| read_error(MESSAGE_COLLECTION_NAME, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(MESSAGE_COLLECTION_NAME, source))?;

        let mut messages = documents
            .into_iter()
            .map(MessageEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn delete_topic(&self, topic: Topic) -> MongoResult<u64> {
        let result = self
            .messages()
            .await
            .delete_many(topic_filter(topic))
            .await
            .map_err(|source| write_error(MESSAGE_COLLECTION_NAME, source))?;
        Ok(result.deleted_count)
    }

    async fn save_star(&self, star: StarEntity) -> MongoResult<()> {
        let filter = star_filter(&star.user_id, star.game_id);
        let document: MongoStarDocument = star.into();
        self.stars()
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| write_error(STAR_COLLECTION_NAME, source))?;
        Ok(())
    }

    async fn find_star(&self, user_id: &str, game_id: Uuid) -> MongoResult<Option<StarEntity>> {
        let document = self
            .stars()
            .await
            .find_one(star_filter(user_id, game_id))
            .await
            .map_err(|source| read_error(STAR_COLLECTION_NAME, source))?;

        document.map(StarEntity::try_from).transpose()
    }

    async fn delete_star(&self, user_id: &str, game_id: Uuid) -> MongoResult<bool> {
        let result = self
            .stars()
            .await
            .delete_one(star_filter(user_id, game_id))
            .await
            .map_err(|source| write_error(STAR_COLLECTION_NAME, source))?;
        Ok(result.deleted_count > 0)
    }

    async fn list_stars_for_user(&self, user_id: &str) -> MongoResult<Vec<StarEntity>> {
        let documents: Vec<MongoStarDocument> = self
            .stars()
            .await
            .find(doc! {"user_id": user_id})
            .await
            .map_err(|source| read_error(STAR_COLLECTION_NAME, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(STAR_COLLECTION_NAME, source))?;

        documents.into_iter().map(StarEntity::try_from).collect()
    }

    async fn delete_stars_for_game(&self, game_id: Uuid) -> MongoResult<u64> {
        let result = self
            .stars()
            .await
            .delete_many(doc! {"game_id": game_id.to_string()})
            .await
            .map_err(|source| write_error(STAR_COLLECTION_NAME, source))?;
        Ok(result.deleted_count)
    }
}

fn write_error(collection: &'static str, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Write { collection, source }
}

fn read_error(collection: &'static str, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Read { collection, source }
}

impl ArchiveStore for MongoArchiveStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await.map_err(Into::into) })
    }

    fn list_top_games(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_top_games(limit).await.map_err(Into::into) })
    }

    fn insert_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_message(message).await.map_err(Into::into) })
    }

    fn recent_messages(
        &self,
        topic: Topic,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.recent_messages(topic, limit).await.map_err(Into::into) })
    }

    fn delete_topic(&self, topic: Topic) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_topic(topic).await.map_err(Into::into) })
    }

    fn save_star(&self, star: StarEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_star(star).await.map_err(Into::into) })
    }

    fn find_star(
        &self,
        user_id: String,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StarEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_star(&user_id, game_id).await.map_err(Into::into) })
    }

    fn delete_star(&self, user_id: String, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_star(&user_id, game_id).await.map_err(Into::into) })
    }

    fn list_stars_for_user(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<StarEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_stars_for_user(&user_id).await.map_err(Into::into) })
    }

    fn delete_stars_for_game(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_stars_for_game(game_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
