//! Shared state and wire types for the intake API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::RecordStore;
use crate::models::UploadedFile;
use crate::storage::StorageBackend;
use crate::uploader::FileUploader;

/// Confirmation body for a stored record.
pub const SUBMIT_OK_MESSAGE: &str = "Data stored successfully.";

// ═══════════════════════════════════════════════════════════
// API context, process-wide state for every handler
// ═══════════════════════════════════════════════════════════

/// Built once at startup and cloned into each request.
/// Both members are safe for concurrent use.
#[derive(Clone)]
pub struct ApiContext {
    pub store: RecordStore,
    pub uploader: FileUploader,
}

impl ApiContext {
    pub fn new(store: RecordStore, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store,
            uploader: FileUploader::new(backend),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        self.uploader.backend()
    }
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

/// `POST /upload-multiple` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "uploadedFiles")]
    pub uploaded_files: Vec<UploadedFile>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
