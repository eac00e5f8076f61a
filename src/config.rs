//! Application-level configuration loading: feed limits, send debounce, session
//! lifetime and the list banner.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PLAYBOOK_BACK_CONFIG_PATH";
/// Environment variable selecting the storage backend.
const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

const DEFAULT_GAME_LIST_LIMIT: usize = 10;
const DEFAULT_FEED_LIMIT: usize = 25;
const DEFAULT_SEND_DEBOUNCE_MS: u64 = 300;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_QUOTA_NOTICE: &str = "No games to show right now. The archive may have reached its \
     daily read quota; please try again later.";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of games returned by the list view.
    pub game_list_limit: usize,
    /// Maximum number of messages kept in a discussion snapshot.
    pub feed_limit: usize,
    /// Window during which repeat sends from one author on one topic are dropped.
    pub send_debounce: Duration,
    /// Idle time after which a session token stops resolving.
    pub session_ttl: Duration,
    /// Banner shown when the game list is empty or could not be loaded.
    pub quota_notice: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        game_list_limit = app_config.game_list_limit,
                        feed_limit = app_config.feed_limit,
                        debounce_ms = app_config.send_debounce.as_millis() as u64,
                        session_ttl_secs = app_config.session_ttl.as_secs(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_list_limit: DEFAULT_GAME_LIST_LIMIT,
            feed_limit: DEFAULT_FEED_LIMIT,
            send_debounce: Duration::from_millis(DEFAULT_SEND_DEBOUNCE_MS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            quota_notice: DEFAULT_QUOTA_NOTICE.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    game_list_limit: usize,
    feed_limit: usize,
    send_debounce_ms: u64,
    session_ttl_secs: u64,
    quota_notice: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            game_list_limit: DEFAULT_GAME_LIST_LIMIT,
            feed_limit: DEFAULT_FEED_LIMIT,
            send_debounce_ms: DEFAULT_SEND_DEBOUNCE_MS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            quota_notice: DEFAULT_QUOTA_NOTICE.to_owned(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        // Zero would leave every view empty; the defaults are also the ceilings.
        let game_list_limit = match value.game_list_limit {
            0 => DEFAULT_GAME_LIST_LIMIT,
            limit => limit.min(DEFAULT_GAME_LIST_LIMIT),
        };
        let feed_limit = match value.feed_limit {
            0 => DEFAULT_FEED_LIMIT,
            limit => limit.min(DEFAULT_FEED_LIMIT),
        };
        let session_ttl_secs = match value.session_ttl_secs {
            0 => DEFAULT_SESSION_TTL_SECS,
            secs => secs,
        };

        Self {
            game_list_limit,
            feed_limit,
            send_debounce: Duration::from_millis(value.send_debounce_ms),
            session_ttl: Duration::from_secs(session_ttl_secs),
            quota_notice: value.quota_notice,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local maps; data is lost on restart.
    #[default]
    Memory,
    /// MongoDB through the official driver.
    #[cfg(feature = "mongo-store")]
    Mongo,
    /// CouchDB over its HTTP API.
    #[cfg(feature = "couch-store")]
    Couch,
}

impl StoreBackend {
    /// Read `STORE_BACKEND`, defaulting to the in-memory store when unset or unknown.
    pub fn from_env() -> Self {
        match env::var(STORE_BACKEND_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(
                    backend = %value,
                    "unknown or disabled store backend; using in-memory store"
                );
                Self::Memory
            }),
            Err(_) => Self::Memory,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Some(Self::Memory),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Some(Self::Mongo),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Some(Self::Couch),
            _ => None,
        }
    }
}
