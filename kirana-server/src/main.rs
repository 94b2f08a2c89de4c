//! kirana-server: chat-to-order backend
//!
//! Long-running service that:
//! - Turns free-text chat messages into structured, tenant-scoped orders
//!   via an LLM with forced structured-tool output
//! - Issues tax-compliant invoices with per-tenant monotonic numbering
//! - Runs queue-backed extraction and webhook workers over Redis
//! - Enforces org isolation, tier rate limits and PII redaction on every
//!   request

mod api;
mod auth;
mod config;
mod correlation;
mod db;
mod error;
mod ingest;
mod invoice;
mod llm;
mod objectstore;
mod queue;
mod redact;
mod state;

use std::time::Duration;

use config::Config;
use state::AppState;
use tokio::signal;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_tracing(&config);

    tracing::info!("Starting kirana-server (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(config).await?;

    // Workers share one shutdown token; they drain in-flight jobs on cancel
    let shutdown = CancellationToken::new();
    let extraction_handle = tokio::spawn(
        queue::extraction::ExtractionWorker::new(state.clone(), shutdown.clone()).run(),
    );
    let webhook_handle =
        tokio::spawn(queue::webhook::WebhookWorker::new(state.clone(), shutdown.clone()).run());

    // Periodic rate limiter cleanup (every 5 minutes)
    let limiter = state.rate_limiter.clone();
    let window = Duration::from_secs(state.config.tier_limits.window_secs);
    let limiter_janitor = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = limiter_janitor.cancelled() => break,
                _ = interval.tick() => limiter.cleanup(window).await,
            }
        }
    });

    // Periodic queue retention sweep (every 10 minutes)
    let extraction_queue = state.extraction_queue.clone();
    let webhook_queue = state.webhook_queue.clone();
    let sweep_janitor = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            tokio::select! {
                _ = sweep_janitor.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = extraction_queue.sweep_retention().await {
                        tracing::error!("Extraction queue sweep failed: {e}");
                    }
                    if let Err(e) = webhook_queue.sweep_retention().await {
                        tracing::error!("Webhook queue sweep failed: {e}");
                    }
                }
            }
        }
    });

    // Start HTTP server
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("kirana-server listening on {addr}");

    let router = api::create_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // HTTP drained; stop workers and wait for in-flight jobs
    shutdown.cancel();
    let _ = extraction_handle.await;
    let _ = webhook_handle.await;

    tracing::info!("kirana-server shut down gracefully");
    Ok(())
}

fn init_tracing(config: &Config) {
    let default_filter = if config.is_development() {
        "kirana_server=debug,tower_http=debug"
    } else {
        "kirana_server=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
