//! `POST /submit`: sanitise an intake payload and insert it as a new row.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::{ApiError, PlainTextError};
use crate::api::types::{ApiContext, SUBMIT_OK_MESSAGE};
use crate::models::IntakePayload;
use crate::sanitize::sanitize_intake;

/// Each call creates a new row; retries are not deduplicated.
pub async fn submit(
    State(ctx): State<ApiContext>,
    payload: Result<Json<IntakePayload>, JsonRejection>,
) -> Result<(StatusCode, &'static str), PlainTextError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!(reason = %rejection.body_text(), "Rejected intake payload");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Request body too large".into())
        } else {
            ApiError::BadRequest(format!("Invalid submission: {}", rejection.body_text()))
        }
    })?;

    let intake = sanitize_intake(&payload).map_err(|e| {
        tracing::warn!(error = %e, "Intake failed sanitisation");
        e
    })?;
    let report_count = intake.report_files.len();

    // Store failures are logged with detail by ApiError::Internal
    let record = ctx.store.insert(intake).await?;

    tracing::info!(
        record_id = %record.id,
        reports = report_count,
        "Intake record stored"
    );

    Ok((StatusCode::OK, SUBMIT_OK_MESSAGE))
}
