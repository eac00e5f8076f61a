use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for PlayBook Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::current_session,
        crate::routes::session::sign_in,
        crate::routes::session::sign_out,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::games::create_game,
        crate::routes::games::update_game,
        crate::routes::games::delete_game,
        crate::routes::games::toggle_star,
        crate::routes::games::starred_games,
        crate::routes::discussion::list_messages,
        crate::routes::discussion::send_text,
        crate::routes::discussion::send_sticker,
        crate::routes::live::games_stream,
        crate::routes::live::discussion_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SignInRequest,
            crate::dto::session::SignInResponse,
            crate::dto::session::SessionView,
            crate::dto::session::GateView,
            crate::dto::session::UserSummary,
            crate::dto::game::GameInput,
            crate::dto::game::GameCard,
            crate::dto::game::GameDetail,
            crate::dto::game::GameListResponse,
            crate::dto::game::StarToggleResponse,
            crate::dto::game::StarredGamesResponse,
            crate::dto::discussion::SendTextRequest,
            crate::dto::discussion::SendStickerRequest,
            crate::dto::discussion::MessageBody,
            crate::dto::discussion::MessageSummary,
            crate::dto::discussion::FeedSnapshot,
            crate::dto::discussion::SendMessageResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session gate"),
        (name = "games", description = "Game archive and stars"),
        (name = "discussions", description = "Global and per-game discussion feeds"),
        (name = "live", description = "Server-sent events live queries"),
    )
)]
pub struct ApiDoc;
