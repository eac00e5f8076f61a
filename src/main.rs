//! PlayBook Back binary entrypoint wiring REST, SSE live queries and the archive store.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playbook_back::{
    config::{AppConfig, StoreBackend},
    dao::archive_store::memory::MemoryArchiveStore,
    routes,
    services::{discussion_service, session_service},
    state::{AppState, SharedState},
};

/// How often expired debounce entries are swept.
const DEBOUNCE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// How often idle sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    start_store(app_state.clone()).await;
    discussion_service::spawn_debounce_janitor(app_state.clone(), DEBOUNCE_SWEEP_INTERVAL);
    session_service::spawn_session_janitor(app_state.clone(), SESSION_SWEEP_INTERVAL);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured archive store. Database backends are connected by
/// the storage supervisor so the server starts in degraded mode until they answer.
async fn start_store(state: SharedState) {
    match StoreBackend::from_env() {
        StoreBackend::Memory => {
            info!("using in-memory archive store");
            state
                .install_store(Arc::new(MemoryArchiveStore::new()))
                .await;
        }
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => {
            use playbook_back::{
                dao::{
                    archive_store::{
                        ArchiveStore,
                        mongodb::{MongoArchiveStore, MongoConfig},
                    },
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            info!("using MongoDB archive store");
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
                let store = MongoArchiveStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ArchiveStore>)
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreBackend::Couch => {
            use playbook_back::{
                dao::{
                    archive_store::{
                        ArchiveStore,
                        couchdb::{CouchArchiveStore, CouchConfig},
                    },
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            info!("using CouchDB archive store");
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env().map_err(StorageError::from)?;
                let store = CouchArchiveStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ArchiveStore>)
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
