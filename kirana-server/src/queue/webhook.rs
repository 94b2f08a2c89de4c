//! Webhook delivery worker
//!
//! POSTs job payloads to subscriber endpoints with the originating
//! correlation ID in `X-Correlation-Id`. Non-2xx responses count as
//! failures so the queue's backoff policy drives redelivery.

use shared::models::job::WebhookJobPayload;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::Job;
use crate::correlation::{self, CORRELATION_HEADER};
use crate::state::AppState;

/// Deliveries in flight at once
const CONCURRENCY: usize = 5;
/// Per-attempt POST timeout
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Idle poll interval when the queue is empty
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct WebhookWorker {
    state: AppState,
    shutdown: CancellationToken,
    http: reqwest::Client,
}

impl WebhookWorker {
    pub fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self {
            state,
            shutdown,
            http: reqwest::Client::new(),
        }
    }

    /// Run until shutdown; in-flight deliveries are drained before returning.
    pub async fn run(self) {
        tracing::info!("Webhook worker started");
        let worker = Arc::new(self);
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));

        loop {
            let permit = tokio::select! {
                _ = worker.shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("worker semaphore never closes")
                }
            };

            match worker.state.webhook_queue.next_job().await {
                Ok(Some(job)) => {
                    let worker = worker.clone();
                    tokio::spawn(async move {
                        worker.process(job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = worker.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!("Webhook queue poll failed: {e}");
                    tokio::select! {
                        _ = worker.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        let _ = semaphore.acquire_many(CONCURRENCY as u32).await;
        tracing::info!("Webhook worker stopped");
    }

    async fn process(&self, mut job: Job) {
        let payload: WebhookJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, "Unreadable webhook payload: {e}");
                let _ = self
                    .state
                    .webhook_queue
                    .fail(&mut job, format!("unreadable payload: {e}"))
                    .await;
                return;
            }
        };

        let span = correlation::job_span("webhooks", &job.id, &payload.correlation_id);
        async {
            match self.deliver(&payload).await {
                Ok(status) => {
                    let result = serde_json::json!({"status": status});
                    if let Err(e) = self.state.webhook_queue.complete(&mut job, result).await {
                        tracing::error!(job_id = %job.id, "Failed to mark delivery completed: {e}");
                    }
                }
                Err(message) => {
                    tracing::warn!(
                        job_id = %job.id,
                        attempt = job.attempts_made,
                        url = %payload.webhook_url,
                        "Webhook delivery failed: {message}"
                    );
                    if let Err(e) = self.state.webhook_queue.fail(&mut job, message).await {
                        tracing::error!(job_id = %job.id, "Failed to record delivery failure: {e}");
                    }
                }
            }
        }
        .instrument(span)
        .await;
    }

    async fn deliver(&self, payload: &WebhookJobPayload) -> Result<u16, String> {
        let response = self
            .http
            .post(&payload.webhook_url)
            .header(CORRELATION_HEADER, &payload.correlation_id)
            .timeout(DELIVERY_TIMEOUT)
            .json(&payload.payload)
            .send()
            .await
            .map_err(|e| format!("transport error: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("subscriber answered {status}"));
        }
        Ok(status.as_u16())
    }
}
