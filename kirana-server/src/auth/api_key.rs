//! API key authentication
//!
//! Keys are opaque strings handed to integrations; only their SHA-256
//! hash is stored. A lookup hit resolves the organization directly.

use sha2::{Digest, Sha256};
use shared::error::{AppError, ErrorCode};

use super::{AuthContext, AuthMethod};
use crate::db;
use crate::state::AppState;

/// Hex-encoded SHA-256 of a raw key
pub fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve an API key to an organization context.
///
/// Misses and inactive keys are indistinguishable to the caller.
pub async fn authenticate(state: &AppState, raw_key: &str) -> Result<AuthContext, AppError> {
    let hash = hash_key(raw_key);

    let key = db::api_keys::find_active_by_hash(&state.pool, &hash)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::new(ErrorCode::ApiKeyInvalid))?;

    // Best-effort usage stamp; an error here must not fail the request
    if let Err(e) = db::api_keys::touch_last_used(&state.pool, key.id).await {
        tracing::warn!(key_id = %key.id, "Failed to update API key last_used_at: {e}");
    }

    Ok(AuthContext {
        org_id: Some(key.organization_id),
        user: None,
        method: AuthMethod::ApiKey,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_sha256() {
        let h = hash_key("kir_live_abc123");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_key("kir_live_abc123"));
        assert_ne!(h, hash_key("kir_live_abc124"));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty string, a fixed reference value
        assert_eq!(
            hash_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
