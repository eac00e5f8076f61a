/// Discussion feeds: topic parsing, snapshots and sends.
pub mod discussion_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game archive operations and star toggling.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Snapshot events published to live query subscribers.
pub mod live_events;
/// Server-Sent Events streaming for live queries.
pub mod live_service;
/// Session gate: sign-in, sign-out and token resolution.
pub mod session_service;
/// Background connection supervision for the archive backend.
pub mod storage_supervisor;

#[cfg(test)]
mod test_support;
