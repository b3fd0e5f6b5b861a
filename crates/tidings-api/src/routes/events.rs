//! Event intake

use axum::{extract::State, http::StatusCode, Json};
use bytes::Bytes;
use serde_json::{json, Value};
use tidings_core::types::EventInfo;

use crate::error::ApiError;
use crate::server::AppState;

/// POST /events
///
/// Accepts one `EventInfo` and answers as soon as its deliveries are queued.
pub async fn publish_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event: EventInfo = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedBody(format!("invalid event: {}", e)))?;

    let scheduled = state.manager.notify(&event).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "scheduled": scheduled }))))
}
