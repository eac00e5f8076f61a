use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("MongoDB environment variable `{var}` has invalid value `{value}`")]
    InvalidEnvVar { var: &'static str, value: String },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write to collection `{collection}`")]
    Write {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to read from collection `{collection}`")]
    Read {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("document `{id}` in collection `{collection}` is invalid: {reason}")]
    InvalidDocument {
        collection: &'static str,
        id: String,
        reason: String,
    },
}
