//! Chat-facing endpoints. Each call holds the user's session lock for the
//! whole pipeline step.

use super::admit;
use crate::models::Reply;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PastModeRequest {
    pub year: i32,
    pub month: u32,
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let result = state
        .pipeline
        .ingest(&mut session, user_id, req.text.as_deref())
        .await;

    Ok(Json(result.into()))
}

pub async fn confirm(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let result = state.pipeline.confirm(&mut session, user_id).await;

    Ok(Json(result.into()))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let discarded = state.pipeline.cancel(&mut session);

    Ok(Json(Reply::Cancelled { discarded }))
}

pub async fn undo(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let result = state.pipeline.undo(&mut session, user_id).await;

    Ok(Json(result.into()))
}

pub async fn enable_past_mode(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<PastModeRequest>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let reply = match state
        .pipeline
        .enable_past_mode(&mut session, req.year, req.month)
    {
        Ok(past_month) => Reply::PastModeEnabled { past_month },
        Err(e) => e.into(),
    };

    Ok(Json(reply))
}

pub async fn disable_past_mode(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Reply>, Response> {
    admit(&state, user_id)?;

    let mut session = state.sessions.lock(user_id).await;
    let previous = state.pipeline.disable_past_mode(&mut session);

    Ok(Json(Reply::PastModeDisabled { previous }))
}
