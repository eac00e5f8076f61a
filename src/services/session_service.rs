use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dto::session::{SessionView, SignInRequest, SignInResponse, UserSummary},
    error::ServiceError,
    state::{SharedState, UserIdentity},
};

/// Open a session for the identity reported by the provider.
pub fn sign_in(state: &SharedState, request: SignInRequest) -> Result<SignInResponse, ServiceError> {
    if let Err(err) = request.validate() {
        warn!(error = %err, "rejected sign-in");
        return Err(err.into());
    }

    let identity = UserIdentity::from(request);
    let token = state.sessions().open(identity.clone());
    info!(uid = %identity.uid, "user signed in");

    Ok(SignInResponse {
        token,
        user: UserSummary::from(identity),
    })
}

/// Revoke a session token.
pub fn sign_out(state: &SharedState, token: &str) -> Result<(), ServiceError> {
    match state.sessions().close(token) {
        Some(identity) => {
            info!(uid = %identity.uid, "user signed out");
            Ok(())
        }
        None => Err(ServiceError::Unauthorized("unknown session token".into())),
    }
}

/// Resolve a token into the identity it was issued for.
pub fn resolve(state: &SharedState, token: &str) -> Result<UserIdentity, ServiceError> {
    state
        .sessions()
        .resolve(token)
        .ok_or_else(|| ServiceError::Unauthorized("unknown session token".into()))
}

/// Decide between the login view and the main view.
pub fn session_view(state: &SharedState, token: Option<&str>) -> SessionView {
    match token.and_then(|token| state.sessions().resolve(token)) {
        Some(identity) => SessionView::main(identity),
        None => SessionView::login(),
    }
}

/// Periodically drop sessions that have been idle past their time-to-live.
pub fn spawn_session_janitor(state: SharedState, every: Duration) {
    let state = Arc::downgrade(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            let expired = state.sessions().purge_expired();
            if expired > 0 {
                debug!(expired, "expired idle sessions");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dto::session::GateView, state::AppState};

    fn request(uid: &str) -> SignInRequest {
        SignInRequest {
            uid: uid.into(),
            display_name: Some("Alice".into()),
            photo_url: None,
        }
    }

    #[test]
    fn gate_follows_the_session_lifecycle() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(session_view(&state, None).view, GateView::Login);

        let response = sign_in(&state, request("alice")).unwrap();
        let view = session_view(&state, Some(&response.token));
        assert_eq!(view.view, GateView::Main);
        assert_eq!(view.user.unwrap().uid, "alice");

        sign_out(&state, &response.token).unwrap();
        assert_eq!(
            session_view(&state, Some(&response.token)).view,
            GateView::Login
        );
        assert!(matches!(
            resolve(&state, &response.token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_sweeps_abandoned_sessions() {
        let config = AppConfig {
            session_ttl: Duration::from_secs(60),
            ..AppConfig::default()
        };
        let state = AppState::new(config);
        let token = sign_in(&state, request("alice")).unwrap().token;
        spawn_session_janitor(state.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(100)).await;
        // Expired entries are removed by the sweep, so closing finds nothing.
        assert!(state.sessions().close(&token).is_none());
        assert_eq!(session_view(&state, Some(&token)).view, GateView::Login);
    }

    #[test]
    fn malformed_identity_is_rejected() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            sign_in(&state, request("")),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
