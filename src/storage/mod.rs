//! Object storage for uploaded report files.
//!
//! Objects are addressed by string keys and exposed through public URLs.
//! The backend trait keeps the uploader independent of where bytes live;
//! the shipped backend is a directory on local disk.

pub mod filesystem;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub use filesystem::FilesystemBackend;

/// Key prefix for every uploaded report.
pub const REPORTS_PREFIX: &str = "reports";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// An object read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `data` under `key` with the given content type.
    /// Never overwrites an existing object.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Read an object and its content type.
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Public URL under which `key` can be fetched.
    fn public_url(&self, key: &str) -> String;
}

/// Generate a storage key for an uploaded file.
///
/// Format: `reports/{unix_millis}-{uuid}-{safe_name}`. The random segment
/// keeps concurrent uploads of the same file name apart.
pub fn generate_storage_key(original_name: &str) -> String {
    format!(
        "{REPORTS_PREFIX}/{}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        sanitize_filename(original_name)
    )
}

/// Reduce a client-supplied file name to a safe key segment.
pub fn sanitize_filename(name: &str) -> String {
    // Keep only the final path component
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Remove consecutive dots (path traversal prevention)
    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.');

    let sanitized: String = sanitized.chars().take(100).collect();

    if sanitized.is_empty() {
        "report".into()
    } else {
        sanitized
    }
}

/// Declared content type, or a guess from the file name.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim).filter(|d| !d.is_empty()) {
        Some(declared) => declared.to_string(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
