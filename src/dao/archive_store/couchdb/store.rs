use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    archive_store::{ArchiveStore, keep_recent, rank_games},
    models::{GameEntity, MessageEntity, StarEntity, Topic},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, CouchGameDocument, CouchMessageDocument,
        CouchStarDocument, DeletedDocument, END_SUFFIX, GAME_PREFIX, STAR_PREFIX, game_doc_id,
        star_doc_id, star_user_prefix, topic_prefix,
    },
};

const ALL_DOCS: &str = "_all_docs";
const BULK_DOCS: &str = "_bulk_docs";

/// Key range and paging for an `_all_docs` query.
struct RangeQuery<'a> {
    prefix: &'a str,
    descending: bool,
    limit: Option<usize>,
}

impl<'a> RangeQuery<'a> {
    fn prefix(prefix: &'a str) -> Self {
        Self {
            prefix,
            descending: false,
            limit: None,
        }
    }

    fn latest(prefix: &'a str, limit: usize) -> Self {
        Self {
            prefix,
            descending: true,
            limit: Some(limit),
        }
    }

    fn params(&self, include_docs: bool) -> Vec<(&'static str, String)> {
        let low = json_key(self.prefix);
        let high = json_key(&format!("{}{}", self.prefix, END_SUFFIX));
        let (start, end) = if self.descending {
            (high, low)
        } else {
            (low, high)
        };

        let mut params = vec![
            ("include_docs", include_docs.to_string()),
            ("startkey", start),
            ("endkey", end),
        ];
        if self.descending {
            params.push(("descending", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

fn json_key(key: &str) -> String {
    serde_json::Value::String(key.to_owned()).to_string()
}

#[derive(Clone)]
pub struct CouchArchiveStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchArchiveStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url());
        let database = Arc::<str>::from(config.database());
        let auth = config
            .credentials()
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                action: "query",
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        action: "create",
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        action: "create",
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                action: "query",
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    /// Delete a document by id, returning `false` when it did not exist.
    async fn delete_document(&self, doc_id: &str) -> CouchResult<bool> {
        let Some(current) = self.get_document::<serde_json::Value>(doc_id).await? else {
            return Ok(false);
        };
        let Some(rev) = current.get("_rev").and_then(|rev| rev.as_str()) else {
            return Err(CouchDaoError::MissingRevision {
                doc_id: doc_id.to_string(),
            });
        };

        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn all_docs(
        &self,
        range: &RangeQuery<'_>,
        include_docs: bool,
    ) -> CouchResult<AllDocsResponse> {
        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&range.params(include_docs))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<AllDocsResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            })
    }

    async fn list_documents<T>(&self, range: RangeQuery<'_>) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let payload = self.all_docs(&range, true).await?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id.clone(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Tombstone every document whose key starts with `prefix` in a single bulk request.
    async fn delete_prefix(&self, prefix: &str) -> CouchResult<u64> {
        let payload = self.all_docs(&RangeQuery::prefix(prefix), false).await?;
        let docs: Vec<DeletedDocument> = payload
            .rows
            .into_iter()
            .filter_map(|row| {
                row.value.map(|value| DeletedDocument {
                    id: row.id,
                    rev: value.rev,
                    deleted: true,
                })
            })
            .collect();

        if docs.is_empty() {
            return Ok(0);
        }

        let count = docs.len() as u64;
        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(count)
        } else {
            Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            })
        }
    }

    /// Write a document, carrying over the current revision so the PUT replaces it.
    async fn upsert<T>(&self, doc_id: &str, mut document: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned + Revisioned,
    {
        if let Some(existing) = self.get_document::<T>(doc_id).await? {
            document.set_rev(existing.rev());
        }
        self.put_document(doc_id, &document).await
    }
}

/// Documents that carry a CouchDB `_rev`.
trait Revisioned {
    fn rev(&self) -> Option<String>;
    fn set_rev(&mut self, rev: Option<String>);
}

macro_rules! impl_revisioned {
    ($($doc:ty),+) => {
        $(impl Revisioned for $doc {
            fn rev(&self) -> Option<String> {
                self.rev.clone()
            }

            fn set_rev(&mut self, rev: Option<String>) {
                self.rev = rev;
            }
        })+
    };
}

impl_revisioned!(CouchGameDocument, CouchStarDocument);

impl ArchiveStore for CouchArchiveStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(game.id);
            let doc = CouchGameDocument::from(game);
            store.upsert(&doc_id, doc).await.map_err(Into::into)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(id);
            let maybe_doc = store.get_document::<CouchGameDocument>(&doc_id).await?;
            Ok(maybe_doc.map(GameEntity::try_from).transpose()?)
        })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_document(&game_doc_id(id))
                .await
                .map_err(Into::into)
        })
    }

    fn list_top_games(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchGameDocument>(RangeQuery::prefix(GAME_PREFIX))
                .await?;
            let mut games = docs
                .into_iter()
                .map(GameEntity::try_from)
                .collect::<CouchResult<Vec<_>>>()?;
            rank_games(&mut games);
            games.truncate(limit);
            Ok(games)
        })
    }

    fn insert_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchMessageDocument::from(message);
            store.put_document(&doc.id, &doc).await.map_err(Into::into)
        })
    }

    fn recent_messages(
        &self,
        topic: Topic,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let prefix = topic_prefix(topic);
            let docs = store
                .list_documents::<CouchMessageDocument>(RangeQuery::latest(&prefix, limit))
                .await?;
            let messages = docs.into_iter().map(MessageEntity::from).collect();
            Ok(keep_recent(messages, limit))
        })
    }

    fn delete_topic(&self, topic: Topic) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_prefix(&topic_prefix(topic))
                .await
                .map_err(Into::into)
        })
    }

    fn save_star(&self, star: StarEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = star_doc_id(&star.user_id, star.game_id);
            let doc = CouchStarDocument::from(star);
            store.upsert(&doc_id, doc).await.map_err(Into::into)
        })
    }

    fn find_star(
        &self,
        user_id: String,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StarEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = star_doc_id(&user_id, game_id);
            let maybe_doc = store.get_document::<CouchStarDocument>(&doc_id).await?;
            Ok(maybe_doc.map(StarEntity::from))
        })
    }

    fn delete_star(&self, user_id: String, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_document(&star_doc_id(&user_id, game_id))
                .await
                .map_err(Into::into)
        })
    }

    fn list_stars_for_user(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<StarEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let prefix = star_user_prefix(&user_id);
            let docs = store
                .list_documents::<CouchStarDocument>(RangeQuery::prefix(&prefix))
                .await?;
            Ok(docs.into_iter().map(StarEntity::from).collect())
        })
    }

    fn delete_stars_for_game(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            // Star keys are grouped by user, so removing a game's stars scans them all.
            let docs = store
                .list_documents::<CouchStarDocument>(RangeQuery::prefix(STAR_PREFIX))
                .await?;
            let mut deleted = 0;
            for doc in docs.into_iter().filter(|doc| doc.star.game_id == game_id) {
                if store.delete_document(&doc.id).await? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
