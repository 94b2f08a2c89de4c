//! Bearer token verification against the identity provider's JWKS
//!
//! Keys are fetched lazily on first use and cached; an unknown `kid`
//! triggers one refetch before the token is rejected (key rotation).

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cached key set refresh interval
const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Claims extracted from a verified token
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// JWKS verifier shared across requests
#[derive(Clone)]
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: String,
    audience: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl JwksVerifier {
    pub fn new(jwks_url: String, audience: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url,
            audience,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Verify a bearer token and extract its claims
    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let header = decode_header(token)
            .map_err(|_| AppError::new(ErrorCode::TokenInvalid))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid))?;

        let key = match self.find_key(&kid, false).await? {
            Some(key) => key,
            // Unknown kid: the provider may have rotated keys
            None => self
                .find_key(&kid, true)
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid))?,
        };

        let mut validation = Validation::new(header.alg);
        if !matches!(header.alg, Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512) {
            return Err(AppError::new(ErrorCode::TokenInvalid));
        }
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            tracing::debug!("Token verification failed: {e}");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::new(ErrorCode::TokenExpired)
                }
                _ => AppError::new(ErrorCode::TokenInvalid),
            }
        })?;

        Ok(data.claims)
    }

    /// Look up a decoding key by kid, optionally forcing a refetch
    async fn find_key(&self, kid: &str, force_refresh: bool) -> Result<Option<DecodingKey>, AppError> {
        let stale = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) if !force_refresh => {
                    if cached.fetched_at.elapsed() < REFRESH_INTERVAL {
                        return Ok(self.key_from_set(&cached.set, kid));
                    }
                    true
                }
                _ => true,
            }
        };

        if stale {
            let set = self.fetch_keys().await?;
            let key = self.key_from_set(&set, kid);
            let mut cache = self.cache.write().await;
            *cache = Some(CachedKeys {
                set,
                fetched_at: Instant::now(),
            });
            return Ok(key);
        }

        Ok(None)
    }

    fn key_from_set(&self, set: &JwkSet, kid: &str) -> Option<DecodingKey> {
        set.find(kid)
            .and_then(|jwk| DecodingKey::from_jwk(jwk).ok())
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AppError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("JWKS fetch failed: {e}");
                AppError::new(ErrorCode::TokenInvalid)
            })?;

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!("JWKS parse failed: {e}");
            AppError::new(ErrorCode::TokenInvalid)
        })
    }
}
