use serde::Serialize;
use utoipa::ToSchema;

/// Archive health returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when a store answers, "degraded" otherwise.
    pub status: String,
    /// Number of live queries with at least one subscriber.
    pub live_feeds: usize,
}

impl HealthResponse {
    pub fn ok(live_feeds: usize) -> Self {
        Self {
            status: "ok".to_string(),
            live_feeds,
        }
    }

    pub fn degraded(live_feeds: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            live_feeds,
        }
    }
}
