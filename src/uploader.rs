//! Report batch uploads.
//!
//! A batch is N files plus N type labels matched by position. The batch is
//! validated as a whole before any byte is stored, every file is then put
//! concurrently, and the batch succeeds only if every put succeeds. When one
//! fails, the objects that did land are deleted again so no caller ever holds
//! a URL from a half-stored batch.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::MAX_FILE_BYTES;
use crate::models::{ReportType, UploadedFile};
use crate::storage::{generate_storage_key, resolve_content_type, StorageBackend, StorageError};

/// One file received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files uploaded")]
    NoFiles,

    #[error("Missing file types")]
    MissingTypes,

    #[error("File types must be a JSON array of strings")]
    InvalidTypes,

    #[error("Received {files} file(s) but {types} file type(s)")]
    CountMismatch { files: usize, types: usize },

    #[error("File {index} has no file type")]
    EmptyLabel { index: usize },

    #[error("File {index} has an unknown file type {label:?}")]
    UnknownLabel { index: usize, label: String },

    #[error("File {name:?} exceeds the {limit_mb} MB limit")]
    FileTooLarge {
        index: usize,
        name: String,
        limit_mb: usize,
    },

    #[error("Upload of file {index} failed: {source}")]
    Storage {
        index: usize,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    /// True when the batch was rejected because of what the caller sent.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Storage { .. })
    }
}

/// Parse the `types` field: a JSON array of report type labels.
pub fn parse_type_labels(raw: Option<&str>) -> Result<Vec<ReportType>, UploadError> {
    let raw = raw.ok_or(UploadError::MissingTypes)?;
    let labels: Vec<String> = serde_json::from_str(raw).map_err(|_| UploadError::InvalidTypes)?;

    labels
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let label = label.trim();
            if label.is_empty() {
                return Err(UploadError::EmptyLabel { index });
            }
            label.parse::<ReportType>().map_err(|_| UploadError::UnknownLabel {
                index,
                label: label.to_string(),
            })
        })
        .collect()
}

/// Check the shape of a batch. Returns the labels in file order.
pub fn validate_batch(
    files: &[IncomingFile],
    types: Option<&str>,
    max_file_bytes: usize,
) -> Result<Vec<ReportType>, UploadError> {
    if files.is_empty() {
        return Err(UploadError::NoFiles);
    }

    let labels = parse_type_labels(types)?;
    if labels.len() != files.len() {
        return Err(UploadError::CountMismatch {
            files: files.len(),
            types: labels.len(),
        });
    }

    if let Some((index, file)) = files
        .iter()
        .enumerate()
        .find(|(_, f)| f.bytes.len() > max_file_bytes)
    {
        return Err(UploadError::FileTooLarge {
            index,
            name: file.file_name.clone(),
            limit_mb: max_file_bytes / (1024 * 1024),
        });
    }

    Ok(labels)
}

/// Stores report batches in object storage.
#[derive(Clone)]
pub struct FileUploader {
    backend: Arc<dyn StorageBackend>,
    max_file_bytes: usize,
}

impl FileUploader {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            max_file_bytes: MAX_FILE_BYTES,
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Validate and store a batch. On success the result has one entry per
    /// file, in input order.
    pub async fn upload_batch(
        &self,
        files: Vec<IncomingFile>,
        types: Option<&str>,
    ) -> Result<Vec<UploadedFile>, UploadError> {
        let labels = validate_batch(&files, types, self.max_file_bytes)?;

        let puts = files.iter().zip(labels).enumerate().map(|(index, (file, label))| {
            let backend = Arc::clone(&self.backend);
            async move {
                let key = generate_storage_key(&file.file_name);
                let content_type = resolve_content_type(file.content_type.as_deref(), &file.file_name);
                match backend.put(&key, &file.bytes, &content_type).await {
                    Ok(()) => Ok((key, label)),
                    Err(source) => Err(UploadError::Storage { index, source }),
                }
            }
        });
        let results = join_all(puts).await;

        let mut stored = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(entry) => stored.push(entry),
                Err(e) => {
                    tracing::error!(error = %e, "Report upload failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            let keys: Vec<String> = stored.into_iter().map(|(key, _)| key).collect();
            self.rollback(&keys).await;
            return Err(err);
        }

        let uploaded: Vec<UploadedFile> = stored
            .into_iter()
            .map(|(key, label)| UploadedFile {
                file_url: self.backend.public_url(&key),
                file_type: label,
            })
            .collect();

        tracing::info!(count = uploaded.len(), "Report batch stored");
        Ok(uploaded)
    }

    async fn rollback(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.backend.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove object from aborted batch");
            }
        }
        if !keys.is_empty() {
            tracing::info!(removed = keys.len(), "Aborted report batch rolled back");
        }
    }
}
