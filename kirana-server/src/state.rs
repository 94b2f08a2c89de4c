//! Application state
//!
//! Every shared resource is constructed here once and handed out by
//! clone: the DB pool, the Redis connection behind both queues, the LLM
//! client, the object store, and the auth/rate-limit caches. No
//! process-wide singletons.

use redis::aio::ConnectionManager;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::sync::Arc;

use crate::auth::jwks::JwksVerifier;
use crate::auth::rate_limit::{RateLimiter, TierCache};
use crate::config::Config;
use crate::llm::LlmClient;
use crate::objectstore::ObjectStore;
use crate::queue::{EXTRACTION_QUEUE, Queue, WEBHOOK_QUEUE, extraction_policy, webhook_policy};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// PostgreSQL connection pool, shared by requests and workers
    pub pool: PgPool,
    /// Redis connection shared by both queues
    pub redis: ConnectionManager,
    pub llm: LlmClient,
    pub jwks: JwksVerifier,
    pub store: ObjectStore,
    pub extraction_queue: Queue,
    pub webhook_queue: Queue,
    pub rate_limiter: RateLimiter,
    pub tier_cache: TierCache,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, BoxError> {
        let mut connect_options = PgConnectOptions::from_str(&config.database_url)?;
        if let Some(ca_pem) = &config.database_ca_cert {
            connect_options = connect_options
                .ssl_mode(PgSslMode::VerifyFull)
                .ssl_root_cert_from_pem(ca_pem.as_bytes().to_vec());
        }
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(connect_options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        // DSNs embed credentials; never log the value
        if config.error_reporting_dsn.is_some() {
            tracing::info!("Error reporting enabled");
        }

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = redis_client.get_connection_manager().await?;

        let llm = LlmClient::new(&config);
        let jwks = JwksVerifier::new(config.idp_jwks_url.clone(), config.idp_audience.clone());
        let store = ObjectStore::new(&config).await;

        let extraction_queue = Queue::new(redis.clone(), EXTRACTION_QUEUE, extraction_policy());
        let webhook_queue = Queue::new(redis.clone(), WEBHOOK_QUEUE, webhook_policy());

        Ok(Self {
            config: Arc::new(config),
            pool,
            redis,
            llm,
            jwks,
            store,
            extraction_queue,
            webhook_queue,
            rate_limiter: RateLimiter::new(),
            tier_cache: TierCache::new(),
        })
    }
}
