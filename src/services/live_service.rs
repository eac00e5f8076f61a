use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dao::models::Topic,
    dto::live::ServerEvent,
    error::ServiceError,
    services::{
        discussion_service, game_service,
        live_events::{EVENT_DISCUSSION_SNAPSHOT, EVENT_GAMES_SNAPSHOT, build_event},
    },
    state::{FeedKey, SharedState, Subscription},
};

/// An open live query: the subscription plus the snapshot to send first.
pub struct LiveQuery {
    pub subscription: Subscription,
    pub initial: Option<ServerEvent>,
}

/// Subscribe to the ranked game list.
pub async fn open_games(state: &SharedState) -> LiveQuery {
    // Subscribe before reading so no write can slip between snapshot and feed.
    let subscription = state.feeds().subscribe(FeedKey::Games);
    let snapshot = game_service::list_games(state).await;

    LiveQuery {
        subscription,
        initial: build_event(EVENT_GAMES_SNAPSHOT, &snapshot),
    }
}

/// Subscribe to the message feed of `topic`.
pub async fn open_discussion(state: &SharedState, topic: Topic) -> Result<LiveQuery, ServiceError> {
    let subscription = state.feeds().subscribe(FeedKey::Discussion(topic));
    // On error the subscription drops here and the hub is pruned again.
    let snapshot = discussion_service::load_feed(state, topic).await?;

    Ok(LiveQuery {
        subscription,
        initial: build_event(EVENT_DISCUSSION_SNAPSHOT, &snapshot),
    })
}

fn to_event(payload: ServerEvent) -> Event {
    Event::default().event(payload.event).data(&*payload.data)
}

/// Convert a live query into an SSE response, forwarding events and releasing
/// the subscription once the client disconnects.
pub fn to_sse_stream(query: LiveQuery) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let LiveQuery {
        mut subscription,
        initial,
    } = query;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the feed and pushes into mpsc
    tokio::spawn(async move {
        let feed = subscription.key();

        let delivered = match initial {
            Some(payload) => tx.send(Ok(to_event(payload))).await.is_ok(),
            None => true,
        };

        if delivered {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    recv_result = subscription.recv() => {
                        match recv_result {
                            Ok(payload) => {
                                if tx.send(Ok(to_event(payload))).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Closed) => break,
                            Err(RecvError::Lagged(skipped)) => {
                                // Snapshots are self-contained; the next one catches up.
                                debug!(feed = %feed, skipped, "live subscriber lagged");
                                continue;
                            }
                        }
                    }
                }
            }
        }

        drop(subscription);
        info!(feed = %feed, "live stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::archive_store::memory::MemoryArchiveStore, state::AppState,
    };

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryArchiveStore::new())).await;
        state
    }

    async fn wait_for_release(state: &SharedState) {
        for _ in 0..100 {
            if state.feeds().active_feeds() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn dropping_the_response_releases_the_feed() {
        let state = state_with_store().await;
        let games = to_sse_stream(open_games(&state).await);
        let global = to_sse_stream(open_discussion(&state, Topic::Global).await.unwrap());
        assert_eq!(state.feeds().active_feeds(), 2);

        drop(games);
        drop(global);
        wait_for_release(&state).await;
        assert_eq!(state.feeds().active_feeds(), 0);
    }

    #[tokio::test]
    async fn failed_opens_do_not_leave_a_feed_behind() {
        let state = state_with_store().await;
        let missing = Topic::Game(uuid::Uuid::new_v4());
        assert!(matches!(
            open_discussion(&state, missing).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(state.feeds().active_feeds(), 0);
    }
}
