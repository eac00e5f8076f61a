use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether an archive store is answering, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live_feeds = state.feeds().active_feeds();

    match state.require_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => HealthResponse::ok(live_feeds),
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                HealthResponse::degraded(live_feeds)
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            HealthResponse::degraded(live_feeds)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::archive_store::memory::MemoryArchiveStore, state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_answers() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        let store = MemoryArchiveStore::new();
        state.install_store(Arc::new(store.clone())).await;
        assert_eq!(health_status(&state).await.status, "ok");

        store.set_offline(true);
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
