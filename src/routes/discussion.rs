use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::discussion::{FeedSnapshot, SendMessageResponse, SendStickerRequest, SendTextRequest},
    error::AppError,
    routes::session::require_session,
    services::discussion_service,
    state::{SharedState, UserIdentity},
};

/// Discussion feed endpoints. Reading is open; sending needs a session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let reads = Router::new().route("/discussions/{topic}/messages", get(list_messages));

    let writes = Router::new()
        .route("/discussions/{topic}/messages", post(send_text))
        .route("/discussions/{topic}/stickers", post(send_sticker))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    reads.merge(writes)
}

/// Latest messages of a topic, oldest first.
#[utoipa::path(
    get,
    path = "/discussions/{topic}/messages",
    tag = "discussions",
    params(("topic" = String, Path, description = "`global` or `game:<uuid>`")),
    responses(
        (status = 200, description = "Feed snapshot", body = FeedSnapshot),
        (status = 400, description = "Malformed topic"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn list_messages(
    State(state): State<SharedState>,
    Path(topic): Path<String>,
) -> Result<Json<FeedSnapshot>, AppError> {
    let topic = discussion_service::parse_topic(&topic)?;
    Ok(Json(discussion_service::load_feed(&state, topic).await?))
}

/// Post a text message. Blank or repeated sends come back with `accepted: false`.
#[utoipa::path(
    post,
    path = "/discussions/{topic}/messages",
    tag = "discussions",
    params(
        ("X-Session-Token" = String, Header, description = "Token returned by sign-in"),
        ("topic" = String, Path, description = "`global` or `game:<uuid>`")
    ),
    request_body = SendTextRequest,
    responses((status = 200, description = "Send outcome", body = SendMessageResponse))
)]
pub async fn send_text(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
    Path(topic): Path<String>,
    Valid(Json(payload)): Valid<Json<SendTextRequest>>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let topic = discussion_service::parse_topic(&topic)?;
    Ok(Json(
        discussion_service::send_text(&state, topic, &user, payload).await?,
    ))
}

/// Post a sticker message.
#[utoipa::path(
    post,
    path = "/discussions/{topic}/stickers",
    tag = "discussions",
    params(
        ("X-Session-Token" = String, Header, description = "Token returned by sign-in"),
        ("topic" = String, Path, description = "`global` or `game:<uuid>`")
    ),
    request_body = SendStickerRequest,
    responses(
        (status = 200, description = "Send outcome", body = SendMessageResponse),
        (status = 400, description = "Sticker reference is not a URL")
    )
)]
pub async fn send_sticker(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
    Path(topic): Path<String>,
    Valid(Json(payload)): Valid<Json<SendStickerRequest>>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let topic = discussion_service::parse_topic(&topic)?;
    Ok(Json(
        discussion_service::send_sticker(&state, topic, &user, payload).await?,
    ))
}
