use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Why a document id does not fit the `game::`, `message::` and `star::` key scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DocIdIssue {
    #[error("unknown key prefix")]
    UnknownPrefix,
    #[error("last segment is not a UUID")]
    InvalidUuid,
}

/// Failures of the CouchDB archive backend.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("CouchDB base URL `{url}` must start with http:// or https://")]
    InvalidBaseUrl { url: String },
    #[error("`{name}` is not a valid CouchDB database name")]
    InvalidDatabaseName { name: String },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The archive database could not be checked or created.
    #[error("failed to {action} CouchDB database `{database}`")]
    Database {
        database: String,
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} when asked to {action} database `{database}`")]
    DatabaseStatus {
        database: String,
        action: &'static str,
        status: StatusCode,
    },
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("document `{path}` does not match the archive schema")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A stored document came back without `_rev`, so it cannot be deleted.
    #[error("document `{doc_id}` has no revision")]
    MissingRevision { doc_id: String },
    #[error("invalid document id `{doc_id}`: {issue}")]
    InvalidDocId { doc_id: String, issue: DocIdIssue },
}

impl CouchDaoError {
    /// Whether the failure comes from stored data rather than from reaching the server.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            CouchDaoError::DeserializeValue { .. }
                | CouchDaoError::MissingRevision { .. }
                | CouchDaoError::InvalidDocId { .. }
        )
    }
}
