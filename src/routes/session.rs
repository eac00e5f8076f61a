use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
    routing::get,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    dto::session::{SessionView, SignInRequest, SignInResponse},
    error::AppError,
    services::session_service,
    state::SharedState,
};

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Session gate endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/session", get(current_session).post(sign_in).delete(sign_out))
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Read the session token from the `X-Session-Token` header, or from the
/// `token` query parameter for clients such as `EventSource` that cannot set headers.
fn session_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(uri)
                .ok()
                .and_then(|Query(query)| query.token)
        })
        .filter(|token| !token.is_empty())
}

/// Report which view the client should render.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    params(("X-Session-Token" = Option<String>, Header, description = "Token returned by sign-in")),
    responses((status = 200, description = "Login or main view", body = SessionView))
)]
pub async fn current_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
) -> Json<SessionView> {
    let token = session_token(&headers, &uri);
    Json(session_service::session_view(&state, token.as_deref()))
}

/// Exchange an identity-provider assertion for a session token.
#[utoipa::path(
    post,
    path = "/session",
    tag = "session",
    request_body = SignInRequest,
    responses(
        (status = 201, description = "Session opened", body = SignInResponse),
        (status = 400, description = "Malformed identity")
    )
)]
pub async fn sign_in(
    State(state): State<SharedState>,
    Json(payload): Json<SignInRequest>,
) -> Result<(StatusCode, Json<SignInResponse>), AppError> {
    let response = session_service::sign_in(&state, payload)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Revoke the presented session token.
#[utoipa::path(
    delete,
    path = "/session",
    tag = "session",
    params(("X-Session-Token" = String, Header, description = "Token returned by sign-in")),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn sign_out(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<StatusCode, AppError> {
    let token = session_token(&headers, &uri).ok_or_else(missing_token)?;
    session_service::sign_out(&state, &token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reject requests without a valid session and expose the caller's identity
/// to handlers as a request extension.
pub async fn require_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(req.headers(), req.uri()).ok_or_else(missing_token)?;
    let identity = session_service::resolve(&state, &token)?;
    debug!(uid = %identity.uid, path = %req.uri().path(), "session resolved");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn missing_token() -> AppError {
    AppError::Unauthorized("missing session token header `X-Session-Token`".into())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_takes_precedence_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_TOKEN_HEADER, HeaderValue::from_static("from-header"));
        let uri: Uri = "/live/games?token=from-query".parse().unwrap();

        assert_eq!(session_token(&headers, &uri).as_deref(), Some("from-header"));
        assert_eq!(
            session_token(&HeaderMap::new(), &uri).as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn empty_tokens_count_as_missing() {
        let uri: Uri = "/live/games?token=".parse().unwrap();
        assert_eq!(session_token(&HeaderMap::new(), &uri), None);
        let uri: Uri = "/live/games".parse().unwrap();
        assert_eq!(session_token(&HeaderMap::new(), &uri), None);
    }
}
