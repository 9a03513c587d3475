//! Process-wide record store.
//!
//! Owns the single SQLite connection for the server. Handlers share it via
//! `Arc`; every call runs on the blocking pool so the async runtime never
//! waits on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use super::{insert_intake, open_database, open_memory_database, DatabaseError, InsertedRecord};
use crate::models::SanitizedIntake;

#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Open (or create) the intake database at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = open_database(path)?;
        tracing::info!(path = %path.display(), "Record store opened");
        Ok(Self::from_connection(conn))
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Insert a sanitised intake as a new row.
    pub async fn insert(&self, intake: SanitizedIntake) -> Result<InsertedRecord, DatabaseError> {
        self.with_connection(move |conn| insert_intake(conn, &intake))
            .await
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
            f(&*guard)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?
    }
}
