//! Correlation ID propagation and request logging
//!
//! Every request gets a correlation ID (inbound `X-Correlation-Id` header
//! or a fresh UUID), carried as a request extension and as a tracing span
//! field so every log line inside the request includes it. The response
//! echoes the header. Jobs embed the ID in their payload; workers re-enter
//! an equivalent span per job.

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;

/// Correlation header name (inbound and outbound)
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Per-request correlation ID, available via request extensions
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Extract the inbound correlation ID or mint a fresh one
fn incoming_id(request: &Request) -> String {
    request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Middleware: establish the correlation span and echo the header
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let id = incoming_id(&request);
    request.extensions_mut().insert(CorrelationId(id.clone()));

    let span = tracing::info_span!("request", correlation_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Span entered by a worker while processing one job, so downstream logs
/// inherit the originating request's correlation ID.
pub fn job_span(queue: &str, job_id: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "job",
        queue = %queue,
        job_id = %job_id,
        correlation_id = %correlation_id,
    )
}

/// Middleware: log request start and completion with latency
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    tracing::info!(method = %method, path = %path, "Request started");

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            latency_ms = %latency.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            latency_ms = %latency.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            latency_ms = %latency.as_millis(),
            "Request completed"
        );
    }

    response
}
