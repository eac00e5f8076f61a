/// Archive persistence (games, discussions, stars) and its backends.
pub mod archive_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
