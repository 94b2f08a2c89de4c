//! Synchronous extraction endpoints
//!
//! The request task calls the LLM client directly, then persists. A
//! client disconnect drops the handler future, which aborts the in-flight
//! vendor call.

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use shared::error::AppError;
use shared::models::order::{ChatMessage, ExtractionType, Order};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use super::{ApiResult, AppJson, check_valid};
use crate::auth::{AuthContext, org_id};
use crate::db::orders;
use crate::ingest;
use crate::state::AppState;

/// POST /api/extract
#[derive(Debug, Deserialize, Validate)]
pub struct ExtractRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub message: String,
}

pub async fn extract_single(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<ExtractRequest>,
) -> ApiResult<Order> {
    let org = org_id(&auth)?;
    check_valid(&req)?;

    let cancel = CancellationToken::new();
    let extraction = state.llm.extract_single(&req.message, &cancel).await?;

    let record = ingest::new_order_from_extraction(
        ExtractionType::SingleMessage,
        &extraction.order,
        extraction.raw,
        json!(req.message),
    );
    let order = orders::add(&state.pool, org, record)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// POST /api/extract-order
#[derive(Debug, Deserialize, Validate)]
pub struct ExtractChatRequest {
    #[validate(length(min = 1, max = 1_000))]
    pub messages: Vec<ChatMessage>,
}

pub async fn extract_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<ExtractChatRequest>,
) -> ApiResult<Order> {
    let org = org_id(&auth)?;
    check_valid(&req)?;

    let cancel = CancellationToken::new();
    let extraction = state.llm.extract_chat(&req.messages, &cancel).await?;

    let record = ingest::new_order_from_extraction(
        ExtractionType::ChatLog,
        &extraction.order,
        extraction.raw,
        json!(req.messages),
    );
    let order = orders::add(&state.pool, org, record)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}
