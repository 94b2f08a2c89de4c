//! Async extraction endpoints and job inspection

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::job::ExtractionJobPayload;
use shared::models::order::ChatMessage;
use validator::Validate;

use super::{ApiResult, AppJson, check_valid};
use crate::auth::{AuthContext, org_id};
use crate::correlation::CorrelationId;
use crate::queue::QueueCounts;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EnqueuedResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "statusUrl")]
    pub status_url: String,
}

/// POST /api/async/extract: 202 with a job handle
#[derive(Debug, Deserialize, Validate)]
pub struct AsyncExtractRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub message: String,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

pub async fn enqueue_single(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(correlation): Extension<CorrelationId>,
    AppJson(req): AppJson<AsyncExtractRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = org_id(&auth)?;
    check_valid(&req)?;

    let payload = ExtractionJobPayload::SingleMessage {
        org_id: org.to_string(),
        correlation_id: correlation.as_str().to_string(),
        message: req.message,
        webhook_url: req.webhook_url,
    };
    enqueue(&state, payload).await
}

/// POST /api/async/extract-order
#[derive(Debug, Deserialize, Validate)]
pub struct AsyncExtractChatRequest {
    #[validate(length(min = 1, max = 1_000))]
    pub messages: Vec<ChatMessage>,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

pub async fn enqueue_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(correlation): Extension<CorrelationId>,
    AppJson(req): AppJson<AsyncExtractChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = org_id(&auth)?;
    check_valid(&req)?;

    let payload = ExtractionJobPayload::ChatLog {
        org_id: org.to_string(),
        correlation_id: correlation.as_str().to_string(),
        messages: req.messages,
        webhook_url: req.webhook_url,
    };
    enqueue(&state, payload).await
}

async fn enqueue(
    state: &AppState,
    payload: ExtractionJobPayload,
) -> Result<impl IntoResponse + use<>, AppError> {
    let priority = payload.priority();
    let value = serde_json::to_value(&payload).map_err(|e| {
        tracing::error!("Job payload serialization failed: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    let job = state
        .extraction_queue
        .enqueue(value, priority)
        .await
        .map_err(AppError::from)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueuedResponse {
            status_url: format!("/api/jobs/{}", job.id),
            job_id: job.id,
        }),
    ))
}

/// GET /api/jobs/:id
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub state: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobStatusResponse> {
    let job = state
        .extraction_queue
        .get_job(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::new(ErrorCode::JobNotFound))?;

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        state: job.state.as_str().to_string(),
        progress: job.progress,
        result: job.result,
        error: job.error,
    }))
}

/// GET /api/queue/health
#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub extraction: QueueCounts,
    pub webhooks: QueueCounts,
}

pub async fn queue_health(State(state): State<AppState>) -> ApiResult<QueueHealthResponse> {
    let extraction = state
        .extraction_queue
        .counts()
        .await
        .map_err(AppError::from)?;
    let webhooks = state.webhook_queue.counts().await.map_err(AppError::from)?;

    Ok(Json(QueueHealthResponse {
        extraction,
        webhooks,
    }))
}
