//! User rows mirroring the identity provider

use shared::models::user::User;
use sqlx::PgPool;

use crate::error::ServiceResult;

const USER_COLUMNS: &str = "id, email, name, organization_id, role, created_at";

pub async fn get(pool: &PgPool, user_id: &str) -> ServiceResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Just-in-time provisioning: insert on first sight, refresh identity
/// fields afterwards. Organization membership and role are managed
/// elsewhere and never touched here.
pub async fn upsert_from_claims(
    pool: &PgPool,
    sub: &str,
    email: &str,
    name: Option<&str>,
) -> ServiceResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id)
        DO UPDATE SET email = EXCLUDED.email,
                      name = COALESCE(EXCLUDED.name, users.name)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(sub)
    .bind(email)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(user)
}
