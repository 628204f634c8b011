//! HTTP handlers for expense-service.

pub mod messages;
pub mod reports;

use crate::models::Reply;
use crate::startup::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

/// Reject non-positive ids and users outside the allow-list before any
/// session is touched.
pub(crate) fn admit(state: &AppState, user_id: i64) -> Result<(), Response> {
    if user_id <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "user_id must be a positive integer"
        ))
        .into_response());
    }

    if !state.gate.admits(user_id) {
        tracing::warn!(user_id = user_id, "User not in allow-list");
        return Err((StatusCode::FORBIDDEN, Json(Reply::access_denied(user_id))).into_response());
    }

    Ok(())
}
