use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{archive_store::ArchiveStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the archive backend and keep the shared state in degraded mode while it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ArchiveStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch(&state, &store).await;
                warn!("exhausted storage reconnect attempts; reconnecting from scratch");

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until it fails and cannot be reconnected in place.
async fn watch(state: &SharedState, store: &Arc<dyn ArchiveStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                state.clear_store().await;

                if !reconnect(store).await {
                    return;
                }

                info!("storage reconnection succeeded; leaving degraded mode");
                state.install_store(store.clone()).await;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(store: &Arc<dyn ArchiveStore>) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
