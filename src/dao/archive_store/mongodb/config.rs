use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tracing::warn;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "playbook";
const CONNECT_ATTEMPTS_ENV: &str = "MONGO_CONNECT_ATTEMPTS";

/// Ping schedule followed while opening the archive database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ConnectRetry {
    /// Wait before the attempt following failed attempt number `failed` (1-based).
    fn delay_after(&self, failed: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    pub retry: ConnectRetry,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, database_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: database_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
            retry: ConnectRetry::default(),
        })
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` (defaults to `playbook`) and
    /// `MONGO_CONNECT_ATTEMPTS` (defaults to 10).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let database = std::env::var("MONGO_DB").ok().filter(|name| !name.is_empty());

        let mut config = Self::from_uri(&uri, database.as_deref()).await?;
        if let Some(attempts) = parse_attempts(std::env::var(CONNECT_ATTEMPTS_ENV).ok())? {
            config.retry.attempts = attempts;
        }
        Ok(config)
    }

    /// Build a client and ping the archive database until it answers or the
    /// retry schedule runs out.
    pub(super) async fn open_database(&self) -> MongoResult<Database> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut failed = 0;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(database),
                Err(err) => {
                    failed += 1;
                    if failed >= self.retry.attempts {
                        return Err(MongoDaoError::InitialPing {
                            attempts: failed,
                            source: err,
                        });
                    }
                    let delay = self.retry.delay_after(failed);
                    warn!(
                        database = %self.database_name,
                        attempts = failed,
                        wait_ms = delay.as_millis() as u64,
                        error = %err,
                        "archive database did not answer ping; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn parse_attempts(raw: Option<String>) -> MongoResult<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(attempts) if attempts > 0 => Ok(Some(attempts)),
        _ => Err(MongoDaoError::InvalidEnvVar {
            var: CONNECT_ATTEMPTS_ENV,
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let retry = ConnectRetry::default();
        let delays: Vec<_> = (1..=7).map(|failed| retry.delay_after(failed)).collect();
        assert_eq!(delays[0], Duration::from_millis(250));
        assert_eq!(delays[1], Duration::from_millis(500));
        assert_eq!(delays[4], Duration::from_secs(4));
        assert_eq!(delays[5], Duration::from_secs(5));
        assert_eq!(retry.delay_after(40), Duration::from_secs(5));
    }

    #[test]
    fn connect_attempts_must_be_positive() {
        assert_eq!(parse_attempts(None).unwrap(), None);
        assert_eq!(parse_attempts(Some(" 3 ".into())).unwrap(), Some(3));
        assert!(matches!(
            parse_attempts(Some("0".into())),
            Err(MongoDaoError::InvalidEnvVar { .. })
        ));
        assert!(parse_attempts(Some("many".into())).is_err());
    }

    #[tokio::test]
    async fn database_defaults_to_playbook() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", None)
            .await
            .unwrap();
        assert_eq!(config.database_name, "playbook");
        assert_eq!(config.retry, ConnectRetry::default());
    }
}
