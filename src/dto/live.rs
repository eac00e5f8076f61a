use std::sync::Arc;

use serde::Serialize;

/// A named snapshot pushed to live query subscribers.
///
/// The payload is serialised once per publish and shared by every receiver.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub event: &'static str,
    pub data: Arc<str>,
}

impl ServerEvent {
    pub fn snapshot<T: Serialize>(event: &'static str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?.into(),
        })
    }
}
