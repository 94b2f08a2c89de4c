//! Role lookups (RBAC, scoped per organization)

use sqlx::PgPool;

use crate::error::ServiceResult;

/// Permission names stored for a role within an organization.
///
/// `None` when the role row does not exist (callers decide whether a
/// fallback applies).
pub async fn get_permissions(
    pool: &PgPool,
    org_id: &str,
    role_name: &str,
) -> ServiceResult<Option<Vec<String>>> {
    let row: Option<(serde_json::Value,)> = sqlx::query_as(
        "SELECT permissions FROM roles WHERE organization_id = $1 AND name = $2",
    )
    .bind(org_id)
    .bind(role_name)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((value,)) => {
            let names: Vec<String> = serde_json::from_value(value)?;
            Ok(Some(names))
        }
        None => Ok(None),
    }
}
