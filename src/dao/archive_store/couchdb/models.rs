use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::{CouchDaoError, DocIdIssue};
use crate::dao::models::{GameEntity, MessageBodyEntity, MessageEntity, StarEntity, Topic};

pub const GAME_PREFIX: &str = "game::";
pub const MESSAGE_PREFIX: &str = "message::";
pub const STAR_PREFIX: &str = "star::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
}

/// Tombstone entry sent through `_bulk_docs`.
#[derive(Debug, Serialize)]
pub struct DeletedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<DeletedDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameBody {
    pub name: String,
    pub description: String,
    pub labels: Vec<String>,
    pub rules: Vec<String>,
    #[serde(default)]
    pub stars: u32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl From<GameEntity> for CouchGameDocument {
    fn from(game: GameEntity) -> Self {
        Self {
            id: game_doc_id(game.id),
            rev: None,
            game: GameBody {
                name: game.name,
                description: game.description,
                labels: game.labels,
                rules: game.rules,
                stars: game.stars,
                created_at: game.created_at,
                updated_at: game.updated_at,
            },
        }
    }
}

impl TryFrom<CouchGameDocument> for GameEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.game.name,
            description: doc.game.description,
            labels: doc.game.labels,
            rules: doc.game.rules,
            stars: doc.game.stars,
            created_at: doc.game.created_at,
            updated_at: doc.game.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMessageDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub message: MessageBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub message_id: Uuid,
    pub topic: Topic,
    pub body: MessageBodyEntity,
    pub author_id: String,
    pub author_avatar_url: Option<String>,
    pub created_at: SystemTime,
}

impl From<MessageEntity> for CouchMessageDocument {
    fn from(message: MessageEntity) -> Self {
        Self {
            id: message_doc_id(&message),
            rev: None,
            message: MessageBody {
                message_id: message.id,
                topic: message.topic,
                body: message.body,
                author_id: message.author_id,
                author_avatar_url: message.author_avatar_url,
                created_at: message.created_at,
            },
        }
    }
}

impl From<CouchMessageDocument> for MessageEntity {
    fn from(doc: CouchMessageDocument) -> Self {
        Self {
            id: doc.message.message_id,
            topic: doc.message.topic,
            body: doc.message.body,
            author_id: doc.message.author_id,
            author_avatar_url: doc.message.author_avatar_url,
            created_at: doc.message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStarDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub star: StarBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarBody {
    pub user_id: String,
    pub game_id: Uuid,
    pub created_at: SystemTime,
}

impl From<StarEntity> for CouchStarDocument {
    fn from(star: StarEntity) -> Self {
        Self {
            id: star_doc_id(&star.user_id, star.game_id),
            rev: None,
            star: StarBody {
                user_id: star.user_id,
                game_id: star.game_id,
                created_at: star.created_at,
            },
        }
    }
}

impl From<CouchStarDocument> for StarEntity {
    fn from(doc: CouchStarDocument) -> Self {
        Self {
            user_id: doc.star.user_id,
            game_id: doc.star.game_id,
            created_at: doc.star.created_at,
        }
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}")
}

/// Stars of one user share a key prefix so they can be range-listed.
pub fn star_doc_id(user_id: &str, game_id: Uuid) -> String {
    format!("{}{game_id}", star_user_prefix(user_id))
}

pub fn star_user_prefix(user_id: &str) -> String {
    format!("{STAR_PREFIX}{user_id}::")
}

pub fn topic_prefix(topic: Topic) -> String {
    format!("{MESSAGE_PREFIX}{topic}::")
}

/// Message keys sort by topic, then creation time, then id, which is the feed order.
pub fn message_doc_id(message: &MessageEntity) -> String {
    let micros = message
        .created_at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros())
        .unwrap_or(0);
    format!("{}{micros:020}::{}", topic_prefix(message.topic), message.id)
}

/// Trailing UUID of a `game::` or `star::` key.
pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let invalid = |issue| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        issue,
    };

    let rest = [GAME_PREFIX, MESSAGE_PREFIX, STAR_PREFIX]
        .iter()
        .find_map(|prefix| doc_id.strip_prefix(prefix))
        .ok_or_else(|| invalid(DocIdIssue::UnknownPrefix))?;
    let id = rest.rsplit_once("::").map_or(rest, |(_, id)| id);

    Uuid::parse_str(id).map_err(|_| invalid(DocIdIssue::InvalidUuid))
}
