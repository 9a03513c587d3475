pub mod intake;
pub mod sqlite;
pub mod store;

pub use intake::*;
pub use sqlite::*;
pub use store::RecordStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Report references could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,

    #[error("Database task failed: {0}")]
    Task(String),
}
