//! Extraction worker
//!
//! Pulls extraction jobs, runs the LLM call, persists the order, and
//! hands success/failure notifications to the webhook queue. Delivery
//! problems never fail an extraction; the queues are decoupled.

use serde_json::json;
use shared::models::job::{ExtractionJobPayload, WebhookJobPayload};
use shared::models::order::ExtractionType;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::Job;
use crate::correlation;
use crate::db;
use crate::error::ServiceError;
use crate::ingest;
use crate::state::AppState;

/// Jobs processed in parallel
const CONCURRENCY: usize = 3;
/// Vendor quota: jobs started per minute, independent of tenant limits
const JOBS_PER_MINUTE: usize = 10;
/// Idle poll interval when the queue is empty
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ExtractionWorker {
    state: AppState,
    shutdown: CancellationToken,
    /// Start timestamps inside the current one-minute window
    window: Mutex<VecDeque<Instant>>,
}

impl ExtractionWorker {
    pub fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self {
            state,
            shutdown,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Run until shutdown; in-flight jobs are drained before returning.
    pub async fn run(self) {
        tracing::info!("Extraction worker started");
        let worker = Arc::new(self);
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));

        loop {
            let permit = tokio::select! {
                _ = worker.shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("worker semaphore never closes")
                }
            };

            if worker.throttle().await {
                break; // shutdown fired while waiting for quota
            }

            match worker.state.extraction_queue.next_job().await {
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
                    tracing::error!("Extraction queue poll failed: {e}");
                    tokio::select! {
                        _ = worker.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        // Wait for in-flight jobs to finish
        let _ = semaphore.acquire_many(CONCURRENCY as u32).await;
        tracing::info!("Extraction worker stopped");
    }

    /// Enforce the per-minute start quota. Returns `true` on shutdown.
    async fn throttle(&self) -> bool {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while let Some(front) = window.front() {
                    if now.duration_since(*front) >= Duration::from_secs(60) {
                        window.pop_front();
                    } else {
                        break;
                    }
                }
                if window.len() < JOBS_PER_MINUTE {
                    window.push_back(now);
                    return false;
                }
                Duration::from_secs(60) - now.duration_since(*window.front().expect("nonempty"))
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => return true,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn process(&self, mut job: Job) {
        let payload: ExtractionJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, "Unreadable extraction payload: {e}");
                let _ = self
                    .state
                    .extraction_queue
                    .fail(&mut job, format!("unreadable payload: {e}"))
                    .await;
                return;
            }
        };

        let span = correlation::job_span("extraction", &job.id, payload.correlation_id());
        async {
            match self.extract_and_persist(&mut job, &payload).await {
                Ok(order_id) => {
                    let result = json!({"orderId": order_id, "status": "completed"});
                    if let Err(e) = self.state.extraction_queue.complete(&mut job, result).await {
                        tracing::error!(job_id = %job.id, "Failed to mark job completed: {e}");
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(job_id = %job.id, attempt = job.attempts_made, "Extraction failed: {message}");
                    match self.state.extraction_queue.fail(&mut job, message.clone()).await {
                        Ok(true) => {
                            // Attempts exhausted: notify via the failure webhook
                            self.notify(&payload, json!({
                                "jobId": job.id,
                                "status": "failed",
                                "error": message,
                            }))
                            .await;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(job_id = %job.id, "Failed to record job failure: {e}");
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    }

    async fn extract_and_persist(
        &self,
        job: &mut Job,
        payload: &ExtractionJobPayload,
    ) -> Result<uuid::Uuid, ServiceError> {
        let queue = &self.state.extraction_queue;
        queue.set_progress(job, 10).await?;

        // Workers are decoupled from client cancellation; only shutdown
        // drains them, and that waits for the job to finish.
        let never_cancelled = CancellationToken::new();

        let (extraction_type, extraction, raw_messages) = match payload {
            ExtractionJobPayload::SingleMessage { message, .. } => {
                let extraction = self
                    .state
                    .llm
                    .extract_single(message, &never_cancelled)
                    .await?;
                (
                    ExtractionType::SingleMessage,
                    extraction,
                    json!(message),
                )
            }
            ExtractionJobPayload::ChatLog { messages, .. } => {
                let extraction = self
                    .state
                    .llm
                    .extract_chat(messages, &never_cancelled)
                    .await?;
                (ExtractionType::ChatLog, extraction, json!(messages))
            }
        };
        queue.set_progress(job, 70).await?;

        let record = ingest::new_order_from_extraction(
            extraction_type,
            &extraction.order,
            extraction.raw,
            raw_messages,
        );
        let order = db::orders::add(&self.state.pool, payload.org_id(), record).await?;
        queue.set_progress(job, 90).await?;

        self.notify(
            payload,
            json!({
                "jobId": job.id,
                "status": "completed",
                "orderId": order.id,
                "order": order,
            }),
        )
        .await;

        Ok(order.id)
    }

    /// Enqueue a delivery job; never posts inline, never fails the caller.
    async fn notify(&self, payload: &ExtractionJobPayload, body: serde_json::Value) {
        let Some(url) = payload.webhook_url() else {
            return;
        };

        let delivery = WebhookJobPayload {
            webhook_url: url.to_string(),
            payload: body,
            correlation_id: payload.correlation_id().to_string(),
        };
        match serde_json::to_value(&delivery) {
            Ok(value) => {
                if let Err(e) = self.state.webhook_queue.enqueue(value, 1).await {
                    tracing::error!("Failed to enqueue webhook delivery: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to serialize webhook payload: {e}"),
        }
    }
}
