//! LLM client: structured extraction against an unreliable remote
//!
//! One POST per attempt, forcing a single tool invocation. Retries with
//! exponential backoff and full jitter, honours `Retry-After` on 429,
//! surfaces non-retriable 4xx immediately, and aborts cleanly on caller
//! cancellation.

pub mod prune;
pub mod schema;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::extraction::ExtractedOrder;
use shared::models::order::{ChatMessage, ExtractionType};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Total attempts per extraction call
const MAX_ATTEMPTS: u32 = 4;
/// Backoff base (doubles per attempt)
const BACKOFF_BASE_MS: u64 = 2_000;
/// Backoff ceiling before jitter
const BACKOFF_CAP_MS: u64 = 10_000;
/// Upper bound of the jitter added to every delay
const JITTER_MS: u64 = 1_000;
/// Vendor API version header value
const API_VERSION: &str = "2023-06-01";

/// A validated extraction plus the verbatim vendor payload for audit
#[derive(Debug, Clone)]
pub struct Extraction {
    pub order: ExtractedOrder,
    pub raw: Value,
}

/// Shared LLM client. Cheap to clone; holds one reqwest client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    chat_model: String,
    attempt_timeout: Duration,
    /// Last-known vendor reachability, reported by the health endpoint
    reachable: Arc<AtomicBool>,
}

enum AttemptError {
    /// 429: wait for the advised delay (or backoff) and retry
    RateLimited { retry_after: Option<Duration> },
    /// 5xx, timeout or transport failure: retry under backoff
    Transient(String),
    /// Non-retriable: 4xx rejection or malformed success body
    Fatal(AppError),
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            chat_model: config.llm_chat_model.clone(),
            attempt_timeout: Duration::from_millis(config.llm_timeout_ms),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the last vendor round-trip succeeded
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Extract a structured order from one free-text message
    pub async fn extract_single(
        &self,
        message: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Extraction> {
        self.call_with_retry(
            &self.model,
            ExtractionType::SingleMessage,
            message.to_string(),
            cancel,
        )
        .await
    }

    /// Extract a structured order from a chat log.
    ///
    /// The log is pruned to the configured character window before the
    /// call; the caller persists the full log separately.
    pub async fn extract_chat(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> AppResult<Extraction> {
        let window = prune::prune_messages(messages, prune::DEFAULT_CONTEXT_CHARS);
        let content = window
            .iter()
            .map(prune::render_message)
            .collect::<Vec<_>>()
            .join("\n");
        self.call_with_retry(&self.chat_model, ExtractionType::ChatLog, content, cancel)
            .await
    }

    async fn call_with_retry(
        &self,
        model: &str,
        kind: ExtractionType,
        user_content: String,
        cancel: &CancellationToken,
    ) -> AppResult<Extraction> {
        let body = request_body(model, kind, &user_content);

        for attempt in 0..MAX_ATTEMPTS {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AppError::new(ErrorCode::ExtractionCancelled));
                }
                outcome = self.attempt(&body) => outcome,
            };

            let delay = match outcome {
                Ok(input) => {
                    self.reachable.store(true, Ordering::Relaxed);
                    let order = schema::coerce_extracted(&input, kind);
                    return Ok(Extraction { order, raw: input });
                }
                Err(AttemptError::Fatal(err)) => {
                    self.reachable.store(true, Ordering::Relaxed);
                    return Err(err);
                }
                Err(AttemptError::RateLimited { retry_after }) => {
                    let computed = backoff_delay(attempt, jitter());
                    // Server-advised delay overrides the computed one
                    retry_after.unwrap_or(computed)
                }
                Err(AttemptError::Transient(reason)) => {
                    self.reachable.store(false, Ordering::Relaxed);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = MAX_ATTEMPTS,
                        "LLM attempt failed, retrying: {reason}"
                    );
                    backoff_delay(attempt, jitter())
                }
            };

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(AppError::new(ErrorCode::ExtractionCancelled));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(AppError::new(ErrorCode::UpstreamUnavailable))
    }

    /// One HTTP attempt under the per-attempt deadline
    async fn attempt(&self, body: &Value) -> Result<Value, AttemptError> {
        let request = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send();

        let response = match tokio::time::timeout(self.attempt_timeout, request).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(AttemptError::Transient(format!("transport error: {e}"))),
            Err(_) => {
                return Err(AttemptError::Transient(format!(
                    "attempt deadline ({}ms) exceeded",
                    self.attempt_timeout.as_millis()
                )));
            }
        };

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(AttemptError::RateLimited { retry_after });
        }
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "LLM rejected request: {detail}");
            return Err(AttemptError::Fatal(AppError::new(
                ErrorCode::UpstreamBadRequest,
            )));
        }
        if !status.is_success() {
            return Err(AttemptError::Transient(format!("upstream status {status}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AttemptError::Transient(format!("body read failed: {e}")))?;

        extract_tool_input(&payload).map_err(AttemptError::Fatal)
    }
}

/// Build the vendor request: one forced tool, cached system prompt.
fn request_body(model: &str, kind: ExtractionType, user_content: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": 2048,
        "system": [{
            "type": "text",
            "text": schema::SYSTEM_PROMPT,
            "cache_control": {"type": "ephemeral"}
        }],
        "tools": [{
            "name": schema::TOOL_NAME,
            "description": "Record the structured order extracted from the messages",
            "input_schema": schema::tool_schema(kind)
        }],
        "tool_choice": {"type": "tool", "name": schema::TOOL_NAME},
        "messages": [{"role": "user", "content": user_content}]
    })
}

/// Pull the forced tool invocation out of a success body.
///
/// Anything without exactly that tool-use block is malformed.
fn extract_tool_input(payload: &Value) -> Result<Value, AppError> {
    let blocks = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::new(ErrorCode::ExtractionMalformed))?;

    blocks
        .iter()
        .find(|block| {
            block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("name").and_then(Value::as_str) == Some(schema::TOOL_NAME)
        })
        .and_then(|block| block.get("input").cloned())
        .ok_or_else(|| AppError::new(ErrorCode::ExtractionMalformed))
}

/// `min(cap, base · 2^attempt) + jitter`
fn backoff_delay(attempt: u32, jitter_ms: u64) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(exp.min(BACKOFF_CAP_MS) + jitter_ms)
}

fn jitter() -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..JITTER_MS)
}

/// Parse a Retry-After header value (delta seconds only)
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(0, 0), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(1, 0), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(2, 0), Duration::from_millis(8_000));
        // Capped at 10s from the third retry on
        assert_eq!(backoff_delay(3, 0), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(9, 0), Duration::from_millis(10_000));
        // Jitter is additive on top of the cap
        assert_eq!(backoff_delay(3, 700), Duration::from_millis(10_700));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn test_extract_tool_input() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "recording the order"},
                {"type": "tool_use", "name": "record_order", "input": {"items": []}}
            ]
        });
        let input = extract_tool_input(&payload).unwrap();
        assert!(input["items"].is_array());
    }

    #[test]
    fn test_missing_tool_use_is_malformed() {
        let text_only = json!({"content": [{"type": "text", "text": "sure, here is JSON..."}]});
        let err = extract_tool_input(&text_only).unwrap_err();
        assert_eq!(err.code, ErrorCode::ExtractionMalformed);

        let wrong_tool = json!({
            "content": [{"type": "tool_use", "name": "other_tool", "input": {}}]
        });
        assert!(extract_tool_input(&wrong_tool).is_err());

        let no_content = json!({"error": "overloaded"});
        assert!(extract_tool_input(&no_content).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("claude-sonnet-4-5", ExtractionType::ChatLog, "A: 5 kg rice");
        assert_eq!(body["tool_choice"]["type"], "tool");
        assert_eq!(body["tool_choice"]["name"], "record_order");
        assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }
}
