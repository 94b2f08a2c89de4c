//! Dead-letter queue administration
//!
//! Failed extraction jobs stay parked until an operator retries them.
//! Retry re-schedules the stored record; nothing is copied.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};

use super::ApiResult;
use crate::queue::Job;
use crate::state::AppState;

/// GET /api/admin/dlq
#[derive(Debug, Deserialize)]
pub struct DlqQuery {
    pub start: Option<isize>,
    pub end: Option<isize>,
}

pub async fn list_failed(
    State(state): State<AppState>,
    Query(query): Query<DlqQuery>,
) -> ApiResult<Vec<Job>> {
    let start = query.start.unwrap_or(0).max(0);
    let end = query.end.unwrap_or(start + 49).max(start);

    let jobs = state
        .extraction_queue
        .list_failed(start, end)
        .await
        .map_err(AppError::from)?;
    Ok(Json(jobs))
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub retried: u64,
}

/// POST /api/admin/dlq/:job_id/retry
pub async fn retry_one(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<RetryResponse> {
    let retried = state
        .extraction_queue
        .retry_failed(&job_id)
        .await
        .map_err(AppError::from)?;

    if !retried {
        return Err(AppError::new(ErrorCode::JobNotFound));
    }
    Ok(Json(RetryResponse { retried: 1 }))
}

/// POST /api/admin/dlq/retry-all
pub async fn retry_all(State(state): State<AppState>) -> ApiResult<RetryResponse> {
    let retried = state
        .extraction_queue
        .retry_all_failed()
        .await
        .map_err(AppError::from)?;
    Ok(Json(RetryResponse { retried }))
}
