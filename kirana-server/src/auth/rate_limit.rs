//! Tier-based sliding-window rate limiting
//!
//! Counters are keyed by organization (or client IP when no org is
//! resolved). Limits come from the organization's tier; read requests get
//! a 5× multiplier. Tier lookups are cached for five minutes; a database
//! failure falls back to the free-tier limit.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::AppError;
use shared::models::organization::OrgTier;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::AuthContext;
use crate::db;
use crate::state::AppState;

/// Multiplier applied to read (GET) requests
const READ_MULTIPLIER: u32 = 5;
/// Tier cache TTL
const TIER_CACHE_TTL: Duration = Duration::from_secs(300);

/// Sliding-window limiter: per-key timestamp logs
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns `true` if the request is allowed under `max` per `window`.
    pub async fn check(&self, key: &str, max: u32, window: Duration) -> bool {
        let mut map = self.inner.lock().await;
        let now = Instant::now();
        let entry = map.entry(key.to_owned()).or_default();

        // Slide the window
        while let Some(oldest) = entry.front() {
            if now.duration_since(*oldest) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= max as usize {
            return false;
        }
        entry.push_back(now);
        true
    }

    /// Drop keys with no activity inside the window
    pub async fn cleanup(&self, window: Duration) {
        let mut map = self.inner.lock().await;
        let now = Instant::now();
        map.retain(|_, entries| {
            entries
                .back()
                .map(|last| now.duration_since(*last) < window)
                .unwrap_or(false)
        });
    }
}

/// Five-minute org→tier cache
#[derive(Clone)]
pub struct TierCache {
    entries: Arc<RwLock<HashMap<String, (OrgTier, Instant)>>>,
}

impl TierCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn get(&self, org_id: &str) -> Option<OrgTier> {
        let entries = self.entries.read().await;
        entries
            .get(org_id)
            .filter(|(_, at)| at.elapsed() < TIER_CACHE_TTL)
            .map(|(tier, _)| *tier)
    }

    async fn put(&self, org_id: &str, tier: OrgTier) {
        let mut entries = self.entries.write().await;
        entries.insert(org_id.to_owned(), (tier, Instant::now()));
    }
}

/// Resolve an organization's tier, falling back to `Free` on DB failure
async fn resolve_tier(state: &AppState, org_id: &str) -> OrgTier {
    if let Some(tier) = state.tier_cache.get(org_id).await {
        return tier;
    }

    match db::organizations::get_tier(&state.pool, org_id).await {
        Ok(Some(tier)) => {
            state.tier_cache.put(org_id, tier).await;
            tier
        }
        Ok(None) => OrgTier::Free,
        Err(e) => {
            tracing::error!(org_id = %org_id, "Tier lookup failed, using free-tier limit: {e}");
            OrgTier::Free
        }
    }
}

fn tier_max(state: &AppState, tier: OrgTier) -> u32 {
    let limits = &state.config.tier_limits;
    match tier {
        OrgTier::Free => limits.free,
        OrgTier::Pro => limits.pro,
        OrgTier::Enterprise => limits.enterprise,
    }
}

/// Extract client IP: X-Forwarded-For first, then peer address
fn extract_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Middleware: enforce the tier limit for the resolved tenant
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let org = request
        .extensions()
        .get::<AuthContext>()
        .and_then(|ctx| ctx.org_id.clone());

    let (key, base) = match org {
        Some(org_id) => {
            let tier = resolve_tier(&state, &org_id).await;
            (format!("org:{org_id}"), tier_max(&state, tier))
        }
        None => (
            format!("ip:{}", extract_ip(&request)),
            state.config.tier_limits.free,
        ),
    };

    let max = if request.method() == &http::Method::GET {
        base.saturating_mul(READ_MULTIPLIER)
    } else {
        base
    };

    let window = Duration::from_secs(state.config.tier_limits.window_secs);
    if !state.rate_limiter.check(&key, max, window).await {
        tracing::warn!(key = %key, max = max, "Rate limit exceeded");
        return Err(AppError::rate_limited().into_response());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sliding_window_allows_then_blocks() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(limiter.check("org:a", 3, window).await);
        }
        assert!(!limiter.check("org:a", 3, window).await);

        // Another key is unaffected
        assert!(limiter.check("org:b", 3, window).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(10);

        assert!(limiter.check("k", 1, window).await);
        assert!(!limiter.check("k", 1, window).await);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(limiter.check("k", 1, window).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_idle_keys() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(10);

        assert!(limiter.check("idle", 5, window).await);
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.cleanup(window).await;

        let map = limiter.inner.lock().await;
        assert!(!map.contains_key("idle"));
    }
}
