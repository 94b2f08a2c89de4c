//! Redis-backed job queues
//!
//! Two logical queues (extraction, webhooks) share one multiplexed
//! connection. Layout per queue:
//!
//! - `job:{id}`   - full job record as JSON
//! - `waiting`    - ZSET scored `priority·2^40 + seq` (priority, then FIFO)
//! - `delayed`    - ZSET scored by the retry's ready-time (millis)
//! - `active`     - SET of ids currently being processed
//! - `completed`  - ZSET scored by finish time, trimmed by retention
//! - `failed`     - ZSET scored by finish time; this is the DLQ
//!
//! Retrying a failed job re-schedules the same record; it does not copy.

pub mod extraction;
pub mod webhook;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::job::JobState;
use shared::util::now_millis;

use crate::error::ServiceResult;

const NS: &str = "kirana:queue";

/// FIFO sequence span per priority band
const SEQ_SPAN: u64 = 1 << 40;

pub const EXTRACTION_QUEUE: &str = "extraction";
pub const WEBHOOK_QUEUE: &str = "webhooks";

/// Per-queue retry and retention policy
#[derive(Debug, Clone)]
pub struct QueuePolicy {
    pub max_attempts: u32,
    /// Base for exponential retry backoff
    pub backoff_base_ms: u64,
    pub completed_retention_ms: i64,
    /// `None` keeps failed jobs indefinitely (the DLQ)
    pub failed_retention_ms: Option<i64>,
}

/// Extraction queue: 3 attempts, 3s base backoff, completed kept 24h,
/// failed kept until retried.
pub fn extraction_policy() -> QueuePolicy {
    QueuePolicy {
        max_attempts: 3,
        backoff_base_ms: 3_000,
        completed_retention_ms: 24 * 3600 * 1000,
        failed_retention_ms: None,
    }
}

/// Webhook queue: 10 attempts, 5s base backoff, completed 24h, failed 72h.
pub fn webhook_policy() -> QueuePolicy {
    QueuePolicy {
        max_attempts: 10,
        backoff_base_ms: 5_000,
        completed_retention_ms: 24 * 3600 * 1000,
        failed_retention_ms: Some(72 * 3600 * 1000),
    }
}

/// Exponential retry delay: `base · 2^(attempts_made - 1)`
pub fn retry_delay_ms(policy: &QueuePolicy, attempts_made: u32) -> u64 {
    policy
        .backoff_base_ms
        .saturating_mul(1u64 << attempts_made.saturating_sub(1).min(16))
}

/// A queued job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: Value,
    pub state: JobState,
    pub priority: u8,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
}

/// Per-state totals for the queue health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

/// One logical queue over the shared Redis connection
#[derive(Clone)]
pub struct Queue {
    conn: ConnectionManager,
    name: String,
    policy: QueuePolicy,
}

fn waiting_score(priority: u8, seq: u64) -> f64 {
    (priority as u64 as f64) * (SEQ_SPAN as f64) + seq as f64
}

impl Queue {
    pub fn new(conn: ConnectionManager, name: &str, policy: QueuePolicy) -> Self {
        Self {
            conn,
            name: name.to_string(),
            policy,
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{NS}:{}:{suffix}", self.name)
    }

    fn job_key(&self, id: &str) -> String {
        format!("{NS}:{}:job:{id}", self.name)
    }

    async fn save(&self, job: &Job) -> ServiceResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.job_key(&job.id), serde_json::to_string(job)?)
            .await?;
        Ok(())
    }

    /// Fetch a job record by id
    pub async fn get_job(&self, id: &str) -> ServiceResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.job_key(id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Enqueue a new job with the given priority (lower runs first)
    pub async fn enqueue(&self, payload: Value, priority: u8) -> ServiceResult<Job> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            queue: self.name.clone(),
            payload,
            state: JobState::Waiting,
            priority,
            attempts_made: 0,
            max_attempts: self.policy.max_attempts,
            progress: 0,
            result: None,
            error: None,
            created_at: now_millis(),
            processed_at: None,
            finished_at: None,
        };
        self.save(&job).await?;

        let mut conn = self.conn.clone();
        let seq: u64 = conn.incr(self.key("seq"), 1u64).await?;
        let _: () = conn
            .zadd(self.key("waiting"), &job.id, waiting_score(priority, seq))
            .await?;
        Ok(job)
    }

    /// Move retry-ready delayed jobs back into the waiting set
    async fn promote_delayed(&self) -> ServiceResult<()> {
        let mut conn = self.conn.clone();
        let now = now_millis();
        let due: Vec<String> = conn
            .zrangebyscore_limit(self.key("delayed"), 0i64, now, 0, 32)
            .await?;

        for id in due {
            let removed: u64 = conn.zrem(self.key("delayed"), &id).await?;
            if removed == 0 {
                continue;
            }
            if let Some(mut job) = self.get_job(&id).await? {
                job.state = JobState::Waiting;
                self.save(&job).await?;
                let seq: u64 = conn.incr(self.key("seq"), 1u64).await?;
                let _: () = conn
                    .zadd(self.key("waiting"), &id, waiting_score(job.priority, seq))
                    .await?;
            }
        }
        Ok(())
    }

    /// Pop the next runnable job, if any, and mark it active
    pub async fn next_job(&self) -> ServiceResult<Option<Job>> {
        self.promote_delayed().await?;

        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn.zpopmin(self.key("waiting"), 1).await?;
        let Some((id, _)) = popped.into_iter().next() else {
            return Ok(None);
        };

        let Some(mut job) = self.get_job(&id).await? else {
            return Ok(None);
        };
        job.state = JobState::Active;
        job.attempts_made += 1;
        job.processed_at = Some(now_millis());
        self.save(&job).await?;

        let _: () = conn.sadd(self.key("active"), &id).await?;
        Ok(Some(job))
    }

    /// Update a job's progress milestone
    pub async fn set_progress(&self, job: &mut Job, progress: u8) -> ServiceResult<()> {
        job.progress = progress;
        self.save(job).await
    }

    /// Finish a job successfully
    pub async fn complete(&self, job: &mut Job, result: Value) -> ServiceResult<()> {
        job.state = JobState::Completed;
        job.progress = 100;
        job.result = Some(result);
        job.finished_at = Some(now_millis());
        self.save(job).await?;

        let mut conn = self.conn.clone();
        let _: () = conn.srem(self.key("active"), &job.id).await?;
        let _: () = conn
            .zadd(self.key("completed"), &job.id, job.finished_at.unwrap_or(0))
            .await?;
        Ok(())
    }

    /// Record a failed attempt. Schedules a delayed retry while attempts
    /// remain; otherwise parks the job in the DLQ. Returns `true` when the
    /// failure is permanent.
    pub async fn fail(&self, job: &mut Job, error: String) -> ServiceResult<bool> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(self.key("active"), &job.id).await?;
        job.error = Some(error);

        if job.attempts_made < job.max_attempts {
            job.state = JobState::Delayed;
            let delay = retry_delay_ms(&self.policy, job.attempts_made);
            let ready_at = now_millis() + delay as i64;
            self.save(job).await?;
            let _: () = conn.zadd(self.key("delayed"), &job.id, ready_at).await?;
            return Ok(false);
        }

        job.state = JobState::Failed;
        job.finished_at = Some(now_millis());
        self.save(job).await?;
        let _: () = conn
            .zadd(self.key("failed"), &job.id, job.finished_at.unwrap_or(0))
            .await?;
        Ok(true)
    }

    // ── DLQ ──

    /// List failed jobs, newest failures first
    pub async fn list_failed(&self, start: isize, end: isize) -> ServiceResult<Vec<Job>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(self.key("failed"), start, end).await?;
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.get_job(&id).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Re-schedule one failed job. Resets the attempt budget and moves the
    /// same record back to waiting. Returns `false` for unknown ids.
    pub async fn retry_failed(&self, job_id: &str) -> ServiceResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.zrem(self.key("failed"), job_id).await?;
        if removed == 0 {
            return Ok(false);
        }

        let Some(mut job) = self.get_job(job_id).await? else {
            return Ok(false);
        };
        job.state = JobState::Waiting;
        job.attempts_made = 0;
        job.progress = 0;
        job.error = None;
        job.finished_at = None;
        self.save(&job).await?;

        let seq: u64 = conn.incr(self.key("seq"), 1u64).await?;
        let _: () = conn
            .zadd(self.key("waiting"), job_id, waiting_score(job.priority, seq))
            .await?;
        Ok(true)
    }

    /// Re-schedule every failed job; returns how many were moved
    pub async fn retry_all_failed(&self) -> ServiceResult<u64> {
        let mut conn = self.conn.clone();
        let mut moved = 0u64;
        loop {
            let ids: Vec<String> = conn.zrange(self.key("failed"), 0, 63).await?;
            if ids.is_empty() {
                break;
            }
            for id in ids {
                if self.retry_failed(&id).await? {
                    moved += 1;
                }
            }
        }
        Ok(moved)
    }

    // ── Maintenance ──

    /// Per-state totals
    pub async fn counts(&self) -> ServiceResult<QueueCounts> {
        let mut conn = self.conn.clone();
        Ok(QueueCounts {
            waiting: conn.zcard(self.key("waiting")).await?,
            delayed: conn.zcard(self.key("delayed")).await?,
            active: conn.scard(self.key("active")).await?,
            completed: conn.zcard(self.key("completed")).await?,
            failed: conn.zcard(self.key("failed")).await?,
        })
    }

    /// Drop finished jobs past their retention window
    pub async fn sweep_retention(&self) -> ServiceResult<()> {
        let now = now_millis();
        self.sweep_set("completed", now - self.policy.completed_retention_ms)
            .await?;
        if let Some(retention) = self.policy.failed_retention_ms {
            self.sweep_set("failed", now - retention).await?;
        }
        Ok(())
    }

    async fn sweep_set(&self, set: &str, cutoff: i64) -> ServiceResult<()> {
        let mut conn = self.conn.clone();
        let expired: Vec<String> = conn
            .zrangebyscore_limit(self.key(set), 0i64, cutoff, 0, 128)
            .await?;
        if expired.is_empty() {
            return Ok(());
        }
        for id in &expired {
            let _: () = conn.del(self.job_key(id)).await?;
        }
        let _: () = conn.zrem(self.key(set), &expired).await?;
        tracing::debug!(queue = %self.name, set = %set, swept = expired.len(), "Swept expired jobs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_dominates_sequence() {
        // A later single-message job (priority 1) still sorts before an
        // earlier chat job (priority 2)
        assert!(waiting_score(1, 999_999) < waiting_score(2, 1));
        // FIFO within one priority band
        assert!(waiting_score(1, 1) < waiting_score(1, 2));
    }

    #[test]
    fn test_retry_delay_schedule() {
        let policy = extraction_policy();
        assert_eq!(retry_delay_ms(&policy, 1), 3_000);
        assert_eq!(retry_delay_ms(&policy, 2), 6_000);
        assert_eq!(retry_delay_ms(&policy, 3), 12_000);

        let policy = webhook_policy();
        assert_eq!(retry_delay_ms(&policy, 1), 5_000);
        assert_eq!(retry_delay_ms(&policy, 4), 40_000);
    }

    #[test]
    fn test_policies_match_contract() {
        let extraction = extraction_policy();
        assert_eq!(extraction.max_attempts, 3);
        assert_eq!(extraction.failed_retention_ms, None);

        let webhook = webhook_policy();
        assert_eq!(webhook.max_attempts, 10);
        assert_eq!(webhook.failed_retention_ms, Some(72 * 3600 * 1000));
        assert_eq!(webhook.completed_retention_ms, 24 * 3600 * 1000);
    }

    #[test]
    fn test_job_serde_roundtrip() {
        let job = Job {
            id: "j1".into(),
            queue: "extraction".into(),
            payload: serde_json::json!({"type": "single_message"}),
            state: JobState::Waiting,
            priority: 1,
            attempts_made: 0,
            max_attempts: 3,
            progress: 0,
            result: None,
            error: None,
            created_at: 1,
            processed_at: None,
            finished_at: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "j1");
        assert_eq!(back.state, JobState::Waiting);
        assert!(!json.contains("result"));
    }
}
