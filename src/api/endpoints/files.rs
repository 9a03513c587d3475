//! `GET /files/*key`: read-only access to stored report objects, so the
//! URLs handed out by uploads resolve.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub async fn fetch(
    State(ctx): State<ApiContext>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let object = ctx.storage().get(&key).await?;
    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        object.bytes,
    )
        .into_response())
}
