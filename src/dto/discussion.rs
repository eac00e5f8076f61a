use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MessageBodyEntity, MessageEntity, Topic},
    dto::format_system_time,
};

/// Text message submitted to a discussion.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendTextRequest {
    /// Message text. Blank text is ignored rather than rejected.
    #[validate(length(max = 4000))]
    pub text: String,
}

/// Sticker message submitted to a discussion.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendStickerRequest {
    /// Image reference of the sticker.
    #[validate(url)]
    pub sticker_url: String,
}

/// Payload of a message as rendered by the feed.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    Sticker { sticker_url: String },
}

impl From<MessageBodyEntity> for MessageBody {
    fn from(body: MessageBodyEntity) -> Self {
        match body {
            MessageBodyEntity::Text { text } => MessageBody::Text { text },
            MessageBodyEntity::Sticker { sticker_url } => MessageBody::Sticker { sticker_url },
        }
    }
}

/// One discussion message.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageSummary {
    pub id: Uuid,
    /// `global` or `game:<uuid>`.
    pub topic: String,
    #[serde(flatten)]
    pub body: MessageBody,
    pub author_id: String,
    pub author_avatar_url: Option<String>,
    /// RFC 3339 timestamp assigned by the server.
    pub created_at: String,
}

impl From<MessageEntity> for MessageSummary {
    fn from(message: MessageEntity) -> Self {
        Self {
            id: message.id,
            topic: message.topic.to_string(),
            body: message.body.into(),
            author_id: message.author_id,
            author_avatar_url: message.author_avatar_url,
            created_at: format_system_time(message.created_at),
        }
    }
}

/// The most recent messages of a topic, oldest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedSnapshot {
    pub topic: String,
    pub messages: Vec<MessageSummary>,
}

impl FeedSnapshot {
    pub fn new(topic: Topic, messages: Vec<MessageEntity>) -> Self {
        Self {
            topic: topic.to_string(),
            messages: messages.into_iter().map(MessageSummary::from).collect(),
        }
    }
}

/// Result of a send. Blank or debounced sends are reported as not accepted.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageSummary>,
}

impl SendMessageResponse {
    pub fn accepted(message: MessageSummary) -> Self {
        Self {
            accepted: true,
            message: Some(message),
        }
    }

    pub fn dropped() -> Self {
        Self {
            accepted: false,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn sticker_reference_must_be_a_url() {
        let ok = SendStickerRequest {
            sticker_url: "https://cdn.example.org/stickers/meeple.png".into(),
        };
        let bad = SendStickerRequest {
            sticker_url: "meeple".into(),
        };
        assert!(ok.validate().is_ok());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn message_body_is_flattened_with_its_kind() {
        let summary = MessageSummary::from(MessageEntity {
            id: Uuid::nil(),
            topic: Topic::Global,
            body: MessageBodyEntity::Sticker {
                sticker_url: "https://cdn.example.org/s.png".into(),
            },
            author_id: "alice".into(),
            author_avatar_url: None,
            created_at: SystemTime::UNIX_EPOCH,
        });

        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["kind"], "sticker");
        assert_eq!(json["sticker_url"], "https://cdn.example.org/s.png");
        assert_eq!(json["topic"], "global");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
