use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        archive_store::ArchiveStore,
        models::{MessageBodyEntity, MessageEntity, Topic},
    },
    dto::discussion::{
        FeedSnapshot, MessageSummary, SendMessageResponse, SendStickerRequest, SendTextRequest,
    },
    error::ServiceError,
    services::live_events,
    state::{SharedState, UserIdentity},
};

/// Parse a topic key from a path segment.
pub fn parse_topic(raw: &str) -> Result<Topic, ServiceError> {
    raw.parse::<Topic>()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))
}

/// The most recent messages of `topic`, oldest first.
pub async fn load_feed(state: &SharedState, topic: Topic) -> Result<FeedSnapshot, ServiceError> {
    let store = state.require_store().await?;
    ensure_topic_exists(store.as_ref(), topic).await?;

    let messages = store
        .recent_messages(topic, state.config().feed_limit)
        .await
        .inspect_err(|err| warn!(%topic, error = %err, "failed to load discussion feed"))?;
    Ok(FeedSnapshot::new(topic, messages))
}

/// Append a text message. Blank text is ignored and nothing is written.
pub async fn send_text(
    state: &SharedState,
    topic: Topic,
    author: &UserIdentity,
    request: SendTextRequest,
) -> Result<SendMessageResponse, ServiceError> {
    request.validate()?;
    if request.text.trim().is_empty() {
        debug!(%topic, author = %author.uid, "ignoring blank message");
        return Ok(SendMessageResponse::dropped());
    }

    send(
        state,
        topic,
        author,
        MessageBodyEntity::Text { text: request.text },
    )
    .await
}

/// Append a sticker message.
pub async fn send_sticker(
    state: &SharedState,
    topic: Topic,
    author: &UserIdentity,
    request: SendStickerRequest,
) -> Result<SendMessageResponse, ServiceError> {
    request.validate()?;
    send(
        state,
        topic,
        author,
        MessageBodyEntity::Sticker {
            sticker_url: request.sticker_url,
        },
    )
    .await
}

async fn send(
    state: &SharedState,
    topic: Topic,
    author: &UserIdentity,
    body: MessageBodyEntity,
) -> Result<SendMessageResponse, ServiceError> {
    let store = state.require_store().await?;
    // Held until the message is written so a concurrent delete of the game
    // either happens first (and we fail) or also removes this message.
    let gate = match topic {
        Topic::Game(_) => Some(state.lock_games().await),
        Topic::Global => None,
    };
    ensure_topic_exists(store.as_ref(), topic).await?;

    if !state.debouncer().try_accept(&author.uid, topic) {
        debug!(%topic, author = %author.uid, "dropping repeated send inside debounce window");
        return Ok(SendMessageResponse::dropped());
    }

    let message = MessageEntity {
        id: Uuid::new_v4(),
        topic,
        body,
        author_id: author.uid.clone(),
        author_avatar_url: author.photo_url.clone(),
        created_at: SystemTime::now(),
    };

    if let Err(err) = store.insert_message(message.clone()).await {
        // A failed write must not block the author's retry.
        state.debouncer().release(&author.uid, topic);
        warn!(%topic, author = %author.uid, error = %err, "failed to append message");
        return Err(err.into());
    }
    drop(gate);
    info!(%topic, message_id = %message.id, author = %author.uid, "message appended");

    live_events::publish_discussion_snapshot(state, topic).await;
    Ok(SendMessageResponse::accepted(MessageSummary::from(message)))
}

async fn ensure_topic_exists(
    store: &dyn ArchiveStore,
    topic: Topic,
) -> Result<(), ServiceError> {
    match topic {
        Topic::Global => Ok(()),
        Topic::Game(id) => match store.find_game(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("game `{id}` not found"))),
        },
    }
}

/// Keep the debounce table from growing with authors who stopped sending.
pub fn spawn_debounce_janitor(state: SharedState, every: std::time::Duration) {
    let state = Arc::downgrade(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            state.debouncer().purge_expired();
        }
    });
}
