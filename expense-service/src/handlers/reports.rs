//! Read-only views over the ledger.

use crate::models::{OwnerSummary, RecordView, YearMonth};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

const DEFAULT_RECENT: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub recent: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OwnersResponse {
    pub owners: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct MonthsResponse {
    pub owner_id: i64,
    pub months: Vec<YearMonth>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub owner_id: i64,
    pub month: YearMonth,
    pub records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: OwnerSummary,
    pub recent: Vec<RecordView>,
}

fn positive(owner_id: i64) -> Result<i64, AppError> {
    if owner_id <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "owner_id must be a positive integer"
        )));
    }
    Ok(owner_id)
}

pub async fn list_owners(State(state): State<AppState>) -> Result<Json<OwnersResponse>, AppError> {
    let owners = state.ledger.distinct_owners().await?;
    Ok(Json(OwnersResponse { owners }))
}

pub async fn owner_months(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> Result<Json<MonthsResponse>, AppError> {
    let owner_id = positive(owner_id)?;
    let months = state.ledger.available_months(owner_id).await?;
    Ok(Json(MonthsResponse { owner_id, months }))
}

pub async fn owner_records(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<RecordsResponse>, AppError> {
    let owner_id = positive(owner_id)?;
    let month = YearMonth::new(query.year, query.month).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "invalid month {}-{}",
            query.year,
            query.month
        ))
    })?;

    let records = state
        .ledger
        .records_for_month(owner_id, month)
        .await?
        .into_iter()
        .map(RecordView::from)
        .collect();

    Ok(Json(RecordsResponse {
        owner_id,
        month,
        records,
    }))
}

pub async fn owner_summary(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let owner_id = positive(owner_id)?;
    let summary = state.ledger.owner_summary(owner_id).await?;
    let recent = state
        .ledger
        .recent_records(owner_id, query.recent.unwrap_or(DEFAULT_RECENT))
        .await?
        .into_iter()
        .map(RecordView::from)
        .collect();

    Ok(Json(SummaryResponse { summary, recent }))
}
