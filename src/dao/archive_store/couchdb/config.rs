use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "playbook";
/// CouchDB refuses longer database names.
const MAX_DATABASE_NAME_LEN: usize = 238;

/// Validated settings for reaching the archive database.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    base_url: String,
    database: String,
    credentials: Option<(String, String)>,
}

impl CouchConfig {
    pub fn new(base_url: &str, database: &str) -> CouchResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CouchDaoError::InvalidBaseUrl {
                url: base_url.to_owned(),
            });
        }
        validate_database_name(database)?;

        Ok(Self {
            base_url: base_url.to_owned(),
            database: database.to_owned(),
            credentials: None,
        })
    }

    /// Use basic auth on every request.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// `COUCH_BASE_URL` is required and `COUCH_DB` defaults to `playbook`.
    /// Credentials apply only when both `COUCH_USERNAME` and `COUCH_PASSWORD` are set.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = std::env::var("COUCH_BASE_URL").map_err(|_| {
            CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            }
        })?;
        let database = std::env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        let config = Self::new(&base_url, &database)?;
        Ok(
            match (
                std::env::var("COUCH_USERNAME").ok(),
                std::env::var("COUCH_PASSWORD").ok(),
            ) {
                (Some(username), Some(password)) => config.with_credentials(username, password),
                _ => config,
            },
        )
    }

    /// Server root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(username, password)| (username.as_str(), password.as_str()))
    }
}

/// A lowercase letter followed by lowercase letters, digits or `_ $ ( ) + -`.
///
/// CouchDB also allows `/`, which is rejected here because database names are
/// placed in request paths unencoded.
fn validate_database_name(name: &str) -> CouchResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '$' | '(' | ')' | '+' | '-'))
        && name.len() <= MAX_DATABASE_NAME_LEN;

    if valid {
        Ok(())
    } else {
        Err(CouchDaoError::InvalidDatabaseName {
            name: name.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let config = CouchConfig::new(" http://localhost:5984/ ", "playbook").unwrap();
        assert_eq!(config.base_url(), "http://localhost:5984");
        assert_eq!(config.database(), "playbook");
        assert!(config.credentials().is_none());
    }

    #[test]
    fn database_names_follow_couchdb_rules() {
        for name in ["playbook", "playbook_test", "p1$(x)+y-z"] {
            assert!(CouchConfig::new("http://couch:5984", name).is_ok(), "{name}");
        }
        for name in ["", "Playbook", "1playbook", "play/book", "play book", "_users"] {
            assert!(
                matches!(
                    CouchConfig::new("http://couch:5984", name),
                    Err(CouchDaoError::InvalidDatabaseName { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn base_url_needs_a_scheme() {
        assert!(matches!(
            CouchConfig::new("localhost:5984", "playbook"),
            Err(CouchDaoError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn credentials_are_attached() {
        let config = CouchConfig::new("https://couch.example.org", "playbook")
            .unwrap()
            .with_credentials("admin", "secret");
        assert_eq!(config.credentials(), Some(("admin", "secret")));
    }
}
