//! `POST /upload-multiple`: store a batch of report files.
//!
//! Multipart fields: `reports` (one part per file) and `types` (JSON array
//! of labels, one per file, same order). Files are read chunk by chunk so an
//! oversized part is refused without buffering all of it.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UploadResponse};
use crate::uploader::{IncomingFile, UploadError};

pub const FILES_FIELD: &str = "reports";
pub const TYPES_FIELD: &str = "types";

pub async fn upload_multiple(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let max_file_bytes = ctx.uploader.max_file_bytes();
    let mut files: Vec<IncomingFile> = Vec::new();
    let mut types: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            FILES_FIELD => {
                let file = read_file(field, files.len(), max_file_bytes).await?;
                files.push(file);
            }
            TYPES_FIELD => {
                types = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unexpected multipart field");
            }
        }
    }

    let uploaded_files = ctx
        .uploader
        .upload_batch(files, types.as_deref())
        .await
        .map_err(|e| {
            if e.is_client_error() {
                tracing::warn!(error = %e, "Rejected report batch");
            }
            e
        })?;

    Ok(Json(UploadResponse { uploaded_files }))
}

async fn read_file(
    mut field: Field<'_>,
    index: usize,
    max_file_bytes: usize,
) -> Result<IncomingFile, ApiError> {
    let file_name = field.file_name().unwrap_or("report").to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > max_file_bytes {
            return Err(UploadError::FileTooLarge {
                index,
                name: file_name,
                limit_mb: max_file_bytes / (1024 * 1024),
            }
            .into());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(IncomingFile {
        file_name,
        content_type,
        bytes,
    })
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Request body too large".into())
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}
