use std::convert::Infallible;

use axum::{
    Extension, Router,
    extract::{Path, State},
    middleware,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    routes::session::require_session,
    services::{discussion_service, live_service},
    state::{SharedState, UserIdentity},
};

/// Live query streams. `EventSource` clients pass the session as `?token=`.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/live/games", get(games_stream))
        .route("/live/discussions/{topic}", get(discussion_stream))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

#[utoipa::path(
    get,
    path = "/live/games",
    tag = "live",
    params(("token" = String, Query, description = "Session token")),
    responses((status = 200, description = "`games.snapshot` events", content_type = "text/event-stream", body = String))
)]
/// Stream the ranked game list, re-sent after every game write.
pub async fn games_stream(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let query = live_service::open_games(&state).await;
    info!(uid = %user.uid, "new game list stream");
    live_service::to_sse_stream(query)
}

#[utoipa::path(
    get,
    path = "/live/discussions/{topic}",
    tag = "live",
    params(
        ("token" = String, Query, description = "Session token"),
        ("topic" = String, Path, description = "`global` or `game:<uuid>`")
    ),
    responses(
        (status = 200, description = "`discussion.snapshot` events", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown game")
    )
)]
/// Stream the latest messages of a topic, re-sent after every send.
pub async fn discussion_stream(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
    Path(topic): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let topic = discussion_service::parse_topic(&topic)?;
    let query = live_service::open_discussion(&state, topic).await?;
    info!(uid = %user.uid, %topic, "new discussion stream");
    Ok(live_service::to_sse_stream(query))
}
