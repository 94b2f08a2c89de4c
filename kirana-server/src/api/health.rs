//! Health check endpoint

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::time::Duration;

use crate::state::AppState;

async fn database_up(state: &AppState) -> bool {
    let probe = sqlx::query("SELECT 1").execute(&state.pool);
    matches!(
        tokio::time::timeout(Duration::from_secs(2), probe).await,
        Ok(Ok(_))
    )
}

async fn queue_up(state: &AppState) -> bool {
    let mut conn = state.redis.clone();
    let probe = async move {
        let pong: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    };
    matches!(
        tokio::time::timeout(Duration::from_secs(2), probe).await,
        Ok(true)
    )
}

/// GET /api/health: 200 when every component is up, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = database_up(&state).await;
    let queue = queue_up(&state).await;
    // No live vendor probe; reachability reflects the last real call
    let llm = state.llm.is_reachable();

    let up = |ok: bool| if ok { "up" } else { "down" };
    let all_up = database && queue && llm;

    let status = if all_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if all_up { "ok" } else { "degraded" },
            "service": "kirana-server",
            "version": env!("CARGO_PKG_VERSION"),
            "components": {
                "database": up(database),
                "queue": up(queue),
                "llm": up(llm),
            }
        })),
    )
}
