use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// Archived game entry with its rules and aggregate star count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Stable identifier for the game.
    pub id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Free-form description shown on the card and in the detail view.
    pub description: String,
    /// Labels in the order they were selected, without duplicates.
    pub labels: Vec<String>,
    /// Ordered rule list.
    pub rules: Vec<String>,
    /// Number of users who starred the game.
    pub stars: u32,
    /// Creation timestamp, kept across edits.
    pub created_at: SystemTime,
    /// Last time the entry was submitted.
    pub updated_at: SystemTime,
}

/// Scoping key under which discussion messages are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Topic {
    /// Community-wide discussion panel.
    Global,
    /// Discussion thread attached to a single game.
    Game(Uuid),
}

const GLOBAL_TOPIC: &str = "global";
const GAME_TOPIC_PREFIX: &str = "game:";

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Global => f.write_str(GLOBAL_TOPIC),
            Topic::Game(id) => write!(f, "{GAME_TOPIC_PREFIX}{id}"),
        }
    }
}

/// Failure to parse a topic key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid topic `{0}`: expected `global` or `game:<uuid>`")]
pub struct TopicParseError(pub String);

impl FromStr for Topic {
    type Err = TopicParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == GLOBAL_TOPIC {
            return Ok(Topic::Global);
        }

        value
            .strip_prefix(GAME_TOPIC_PREFIX)
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(Topic::Game)
            .ok_or_else(|| TopicParseError(value.to_string()))
    }
}

/// Payload carried by a discussion message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBodyEntity {
    /// Plain text message.
    Text { text: String },
    /// Image reference picked from the sticker sheet.
    Sticker { sticker_url: String },
}

/// Append-only discussion message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEntity {
    /// Stable identifier for the message.
    pub id: Uuid,
    /// Feed the message belongs to.
    pub topic: Topic,
    /// Text or sticker payload.
    pub body: MessageBodyEntity,
    /// Identity-provider user id of the author.
    pub author_id: String,
    /// Avatar of the author at the time of sending.
    pub author_avatar_url: Option<String>,
    /// Server-assigned creation timestamp.
    pub created_at: SystemTime,
}

impl MessageEntity {
    /// Sort key used by every feed: creation time, then id for identical timestamps.
    pub fn feed_order(&self) -> (SystemTime, Uuid) {
        (self.created_at, self.id)
    }
}

/// Per-user, per-game star membership marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarEntity {
    /// User who starred the game.
    pub user_id: String,
    /// Starred game.
    pub game_id: Uuid,
    /// When the star was given.
    pub created_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_round_trips_through_display() {
        let id = Uuid::new_v4();
        assert_eq!("global".parse::<Topic>(), Ok(Topic::Global));
        assert_eq!(format!("game:{id}").parse::<Topic>(), Ok(Topic::Game(id)));
        assert_eq!(Topic::Game(id).to_string(), format!("game:{id}"));
    }

    #[test]
    fn topic_rejects_unknown_keys() {
        assert!("Global".parse::<Topic>().is_err());
        assert!("game:".parse::<Topic>().is_err());
        assert!("game:not-a-uuid".parse::<Topic>().is_err());
        assert!("discussion".parse::<Topic>().is_err());
    }

    #[test]
    fn message_body_serializes_with_kind_tag() {
        let body = MessageBodyEntity::Sticker {
            sticker_url: "https://stickers.example/cat.png".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "sticker");
        assert_eq!(json["sticker_url"], "https://stickers.example/cat.png");
    }
}
