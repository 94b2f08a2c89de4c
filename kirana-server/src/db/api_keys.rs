//! API key rows

use shared::models::api_key::ApiKey;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceResult;

/// Look up an active key by its SHA-256 hash
pub async fn find_active_by_hash(pool: &PgPool, key_hash: &str) -> ServiceResult<Option<ApiKey>> {
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, organization_id, key_hash, key_mask, is_active, last_used_at, created_at
        FROM api_keys
        WHERE key_hash = $1 AND is_active = TRUE
        "#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    Ok(key)
}

/// Stamp the key's last successful use
pub async fn touch_last_used(pool: &PgPool, key_id: Uuid) -> ServiceResult<()> {
    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(key_id)
        .execute(pool)
        .await?;
    Ok(())
}
