use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{GameEntity, MessageBodyEntity, MessageEntity, StarEntity, Topic};

pub const GAME_COLLECTION_NAME: &str = "games";
pub const MESSAGE_COLLECTION_NAME: &str = "messages";
pub const STAR_COLLECTION_NAME: &str = "stars";

const TEXT_KIND: &str = "text";
const STICKER_KIND: &str = "sticker";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    description: String,
    labels: Vec<String>,
    rules: Vec<String>,
    #[serde(default)]
    stars: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            description: value.description,
            labels: value.labels,
            rules: value.rules,
            stars: i64::from(value.stars),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(GAME_COLLECTION_NAME, &value.id)?,
            name: value.name,
            description: value.description,
            labels: value.labels,
            rules: value.rules,
            stars: u32::try_from(value.stars.max(0)).unwrap_or(u32::MAX),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Messages of every topic share one collection, discriminated by the `topic` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessageDocument {
    #[serde(rename = "_id")]
    id: String,
    topic: String,
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sticker_url: Option<String>,
    author_id: String,
    author_avatar_url: Option<String>,
    created_at: DateTime,
}

impl From<MessageEntity> for MongoMessageDocument {
    fn from(value: MessageEntity) -> Self {
        let (kind, text, sticker_url) = match value.body {
            MessageBodyEntity::Text { text } => (TEXT_KIND, Some(text), None),
            MessageBodyEntity::Sticker { sticker_url } => (STICKER_KIND, None, Some(sticker_url)),
        };

        Self {
            id: value.id.to_string(),
            topic: value.topic.to_string(),
            kind: kind.to_owned(),
            text,
            sticker_url,
            author_id: value.author_id,
            author_avatar_url: value.author_avatar_url,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoMessageDocument> for MessageEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMessageDocument) -> Result<Self, Self::Error> {
        let invalid = |reason: String| MongoDaoError::InvalidDocument {
            collection: MESSAGE_COLLECTION_NAME,
            id: value.id.clone(),
            reason,
        };

        let topic = value
            .topic
            .parse::<Topic>()
            .map_err(|err| invalid(err.to_string()))?;
        let body = match (value.kind.as_str(), value.text, value.sticker_url) {
            (TEXT_KIND, Some(text), _) => MessageBodyEntity::Text { text },
            (STICKER_KIND, _, Some(sticker_url)) => MessageBodyEntity::Sticker { sticker_url },
            (kind, _, _) => return Err(invalid(format!("unexpected body for kind `{kind}`"))),
        };

        Ok(Self {
            id: parse_id(MESSAGE_COLLECTION_NAME, &value.id)?,
            topic,
            body,
            author_id: value.author_id,
            author_avatar_url: value.author_avatar_url,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStarDocument {
    user_id: String,
    game_id: String,
    created_at: DateTime,
}

impl From<StarEntity> for MongoStarDocument {
    fn from(value: StarEntity) -> Self {
        Self {
            user_id: value.user_id,
            game_id: value.game_id.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoStarDocument> for StarEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoStarDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            game_id: parse_id(STAR_COLLECTION_NAME, &value.game_id)?,
            user_id: value.user_id,
            created_at: value.created_at.to_system_time(),
        })
    }
}

fn parse_id(collection: &'static str, raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::InvalidDocument {
        collection,
        id: raw.to_owned(),
        reason: err.to_string(),
    })
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn topic_filter(topic: Topic) -> Document {
    doc! {"topic": topic.to_string()}
}

pub fn star_filter(user_id: &str, game_id: Uuid) -> Document {
    doc! {"user_id": user_id, "game_id": game_id.to_string()}
}
