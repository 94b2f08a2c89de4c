//! API routes
//!
//! Handlers only adapt: parse → storage/LLM/queue → shape. Errors bubble
//! as `AppError` and are mapped once, in its `IntoResponse`.

pub mod dlq;
pub mod extract;
pub mod health;
pub mod invoice;
pub mod jobs;
pub mod orders;
pub mod stats;

use axum::extract::{FromRequest, Request};
use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware};
use shared::error::AppError;
use tower_http::cors::CorsLayer;

use crate::auth;
use crate::correlation;
use crate::redact;
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// `Json<T>` with rejections mapped into the uniform error body
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::validation(rejection.to_string())),
        }
    }
}

/// Map validator output into the uniform error body
pub fn check_valid<T: validator::Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|e| {
        AppError::validation("Request validation failed")
            .with_details(serde_json::to_value(e).unwrap_or_default())
    })
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    // Tenant-scoped endpoints: org context + tier limits + PII redaction
    let org = Router::new()
        .route("/api/stats", get(stats::get_stats))
        .route("/api/orders", get(orders::list_orders))
        .route(
            "/api/orders/{id}",
            get(orders::get_order)
                .patch(orders::update_status)
                .delete(orders::delete_order),
        )
        .route("/api/orders/{id}/edit", patch(orders::edit_order))
        .route("/api/orders/{id}/download", get(invoice::download_invoice))
        .route("/api/extract", post(extract::extract_single))
        .route("/api/extract-order", post(extract::extract_chat))
        .route("/api/generate-invoice", post(invoice::generate_invoice))
        .route("/api/async/extract", post(jobs::enqueue_single))
        .route("/api/async/extract-order", post(jobs::enqueue_chat))
        .route("/api/admin/dlq", get(dlq::list_failed))
        .route("/api/admin/dlq/{job_id}/retry", post(dlq::retry_one))
        .route("/api/admin/dlq/retry-all", post(dlq::retry_all))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn(auth::require_org_middleware));

    // Endpoints open to any authenticated principal
    let authenticated_any = Router::new()
        .route("/api/jobs/{id}", get(jobs::job_status))
        .route("/api/queue/health", get(jobs::queue_health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_middleware,
        ));

    // Redaction covers every authenticated response, job results included
    let authenticated = org
        .merge(authenticated_any)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            redact::pii_redaction_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health::health_check))
        .merge(authenticated)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(correlation::request_logging_middleware))
        .layer(middleware::from_fn(correlation::correlation_middleware))
        .with_state(state)
}
