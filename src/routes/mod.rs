use axum::Router;

use crate::state::SharedState;

pub mod discussion;
pub mod docs;
pub mod games;
pub mod health;
pub mod live;
pub mod session;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(games::router(state.clone()))
        .merge(discussion::router(state.clone()))
        .merge(live::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::archive_store::memory::MemoryArchiveStore,
        routes::session::SESSION_TOKEN_HEADER,
        state::AppState,
    };

    async fn test_app() -> (Router, SharedState) {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryArchiveStore::new())).await;
        (router(state.clone()), state)
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn new_game(token: Option<&str>) -> Request<Body> {
        json_request(
            Method::POST,
            "/games",
            token,
            json!({
                "name": "Crazy Eights",
                "description": "Shed your hand by matching suit or rank",
                "labels": ["cards"],
                "rules": ["Deal five cards", "Eights are wild"],
            }),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn sign_in(app: &Router) -> String {
        let res = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/session",
                None,
                json!({ "uid": "alice_01", "display_name": "Alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        json_body(res).await["token"].as_str().unwrap().to_owned()
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
    async fn writes_require_a_known_session() {
        let (app, _state) = test_app().await;

        let res = app.clone().oneshot(new_game(None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(res).await["message"].as_str().is_some());

        let res = app
            .clone()
            .oneshot(new_game(Some("not-a-real-token")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let token = sign_in(&app).await;
        let res = app.clone().oneshot(new_game(Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_body(res).await["name"], "Crazy Eights");
    }

    #[tokio::test]
    async fn reads_are_open() {
        let (app, _state) = test_app().await;
        let res = app.clone().oneshot(get("/games")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(get("/discussions/global/messages"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_out_tokens_stop_working() {
        let (app, _state) = test_app().await;
        let token = sign_in(&app).await;

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/session")
                    .header(SESSION_TOKEN_HEADER, &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app.oneshot(new_game(Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn live_streams_take_the_token_from_the_query() {
        let (app, state) = test_app().await;

        let res = app.clone().oneshot(get("/live/games")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = app
            .clone()
            .oneshot(get("/live/games?token=not-a-real-token"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.feeds().active_feeds(), 0);

        let token = sign_in(&app).await;
        let res = app
            .oneshot(get(&format!("/live/games?token={token}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(state.feeds().active_feeds(), 1);

        // The client going away drops the body, which must release the feed.
        drop(res);
        wait_for_release(&state).await;
        assert_eq!(state.feeds().active_feeds(), 0);
    }
}
