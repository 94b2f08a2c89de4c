//! Organization statistics endpoint

use axum::{Extension, Json, extract::State};
use shared::error::AppError;

use super::ApiResult;
use crate::auth::{AuthContext, org_id};
use crate::db::stats;
use crate::state::AppState;

/// GET /api/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<stats::OrgStats> {
    let org = org_id(&auth)?;
    let stats = stats::get_stats(&state.pool, org)
        .await
        .map_err(AppError::from)?;
    Ok(Json(stats))
}
