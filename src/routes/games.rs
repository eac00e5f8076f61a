use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{GameDetail, GameInput, GameListResponse, StarToggleResponse, StarredGamesResponse},
    error::AppError,
    routes::session::require_session,
    services::game_service,
    state::{SharedState, UserIdentity},
};

/// Game archive endpoints. Reads are open; writes need a session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let reads = Router::new()
        .route("/games", get(list_games))
        .route("/games/{id}", get(get_game));

    let writes = Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", put(update_game).delete(delete_game))
        .route("/games/{id}/star", post(toggle_star))
        .route("/stars", get(starred_games))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    reads.merge(writes)
}

/// Ranked game list; carries the quota notice when empty or unavailable.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    responses((status = 200, description = "Top games by stars", body = GameListResponse))
)]
pub async fn list_games(State(state): State<SharedState>) -> Json<GameListResponse> {
    Json(game_service::list_games(&state).await)
}

/// Retrieve one game with every field.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game", body = GameDetail),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

/// Submit a new game.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    params(("X-Session-Token" = String, Header, description = "Token returned by sign-in")),
    request_body = GameInput,
    responses(
        (status = 201, description = "Game created", body = GameDetail),
        (status = 400, description = "Incomplete form")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameInput>>,
) -> Result<(StatusCode, Json<GameDetail>), AppError> {
    let game = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Re-submit every field of an existing game.
#[utoipa::path(
    put,
    path = "/games/{id}",
    tag = "games",
    params(
        ("X-Session-Token" = String, Header, description = "Token returned by sign-in"),
        ("id" = Uuid, Path, description = "Identifier of the game")
    ),
    request_body = GameInput,
    responses(
        (status = 200, description = "Game overwritten", body = GameDetail),
        (status = 400, description = "Incomplete form"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn update_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<GameInput>>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(game_service::update_game(&state, id, payload).await?))
}

/// Delete a game with its stars and discussion thread.
#[utoipa::path(
    delete,
    path = "/games/{id}",
    tag = "games",
    params(
        ("X-Session-Token" = String, Header, description = "Token returned by sign-in"),
        ("id" = Uuid, Path, description = "Identifier of the game")
    ),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Star or unstar a game for the caller.
#[utoipa::path(
    post,
    path = "/games/{id}/star",
    tag = "games",
    params(
        ("X-Session-Token" = String, Header, description = "Token returned by sign-in"),
        ("id" = Uuid, Path, description = "Identifier of the game")
    ),
    responses(
        (status = 200, description = "Star toggled", body = StarToggleResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn toggle_star(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<StarToggleResponse>, AppError> {
    Ok(Json(game_service::toggle_star(&state, &user, id).await?))
}

/// Games starred by the caller.
#[utoipa::path(
    get,
    path = "/stars",
    tag = "games",
    params(("X-Session-Token" = String, Header, description = "Token returned by sign-in")),
    responses((status = 200, description = "Starred game ids", body = StarredGamesResponse))
)]
pub async fn starred_games(
    State(state): State<SharedState>,
    Extension(user): Extension<UserIdentity>,
) -> Result<Json<StarredGamesResponse>, AppError> {
    Ok(Json(game_service::starred_games(&state, &user).await?))
}
