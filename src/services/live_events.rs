use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dao::models::Topic,
    dto::{discussion::FeedSnapshot, live::ServerEvent},
    error::ServiceError,
    services::{discussion_service, game_service},
    state::{FeedKey, SharedState},
};

pub const EVENT_GAMES_SNAPSHOT: &str = "games.snapshot";
pub const EVENT_DISCUSSION_SNAPSHOT: &str = "discussion.snapshot";

/// Push a fresh ranked list to the game list subscribers.
pub async fn publish_games_snapshot(state: &SharedState) {
    let Some(_refresh) = state.feeds().lock_refresh(FeedKey::Games).await else {
        return;
    };

    let snapshot = game_service::list_games(state).await;
    send_event(state, FeedKey::Games, EVENT_GAMES_SNAPSHOT, &snapshot);
}

/// Push the latest page of `topic` to its subscribers.
pub async fn publish_discussion_snapshot(state: &SharedState, topic: Topic) {
    let key = FeedKey::Discussion(topic);
    let Some(_refresh) = state.feeds().lock_refresh(key).await else {
        return;
    };

    match discussion_service::load_feed(state, topic).await {
        Ok(snapshot) => send_event(state, key, EVENT_DISCUSSION_SNAPSHOT, &snapshot),
        // The game behind the thread was deleted; its feed is now empty.
        Err(ServiceError::NotFound(_)) => {
            let snapshot = FeedSnapshot::new(topic, Vec::new());
            send_event(state, key, EVENT_DISCUSSION_SNAPSHOT, &snapshot);
        }
        Err(err) => warn!(%topic, error = %err, "failed to refresh discussion snapshot"),
    }
}

/// Serialise `payload` under `event`, logging instead of failing.
pub fn build_event<T: Serialize>(event: &'static str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::snapshot(event, payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialise live event");
            None
        }
    }
}

fn send_event<T: Serialize>(state: &SharedState, key: FeedKey, event: &'static str, payload: &T) {
    if let Some(event) = build_event(event, payload) {
        debug!(feed = %key, "publishing live snapshot");
        state.feeds().publish(key, event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::archive_store::memory::MemoryArchiveStore,
        dto::game::GameInput,
        services::{live_service, test_support::StallingStore},
        state::{AppState, UserIdentity},
    };

    fn user(uid: &str) -> UserIdentity {
        UserIdentity {
            uid: uid.into(),
            display_name: None,
            photo_url: None,
        }
    }

    fn top_stars(data: &str) -> u64 {
        let snapshot: Value = serde_json::from_str(data).unwrap();
        snapshot["games"][0]["stars"].as_u64().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn a_slow_refresh_cannot_overwrite_a_newer_snapshot() {
        let state = AppState::new(AppConfig::default());
        // Listing #0 is the subscriber's initial snapshot, #1 the first toggle's refresh.
        let store = Arc::new(StallingStore::new(MemoryArchiveStore::new()).stalling_listing(1));
        state.install_store(store.clone()).await;

        let game = game_service::create_game(
            &state,
            GameInput {
                name: "Hearts".into(),
                description: "Avoid the queen of spades".into(),
                labels: vec!["cards".into()],
                rules: vec!["Pass three cards".into()],
            },
        )
        .await
        .unwrap();
        let mut query = live_service::open_games(&state).await;

        let first = tokio::spawn({
            let state = state.clone();
            async move { game_service::toggle_star(&state, &user("alice"), game.id).await }
        });
        // The first refresh has read one star and is still in flight.
        store.wait_for_stall().await;

        let second = game_service::toggle_star(&state, &user("bob"), game.id)
            .await
            .unwrap();
        assert_eq!(second.stars, 2);
        first.await.unwrap().unwrap();

        let older = query.subscription.recv().await.unwrap();
        let newer = query.subscription.recv().await.unwrap();
        assert_eq!(older.event, EVENT_GAMES_SNAPSHOT);
        assert_eq!(top_stars(&older.data), 1);
        assert_eq!(top_stars(&newer.data), 2);
    }

    #[tokio::test]
    async fn nothing_is_computed_for_feeds_without_listeners() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(StallingStore::new(MemoryArchiveStore::new()));
        state.install_store(store.clone()).await;

        publish_games_snapshot(&state).await;
        assert_eq!(store.listings(), 0);

        let _query = live_service::open_games(&state).await;
        publish_games_snapshot(&state).await;
        assert_eq!(store.listings(), 2);
    }
}
