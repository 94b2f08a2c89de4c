//! Customer rows (scoped per organization)

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::ServiceResult;

/// Reuse a customer by `(org, name)` or create one. Used by the chat
/// extraction path, where the sender name is the only identity signal.
pub async fn find_or_create_by_name(
    tx: &mut Transaction<'_, Postgres>,
    org_id: &str,
    name: &str,
    address: Option<&str>,
) -> ServiceResult<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM customers WHERE organization_id = $1 AND name = $2 LIMIT 1",
    )
    .bind(org_id)
    .bind(name)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    create(tx, org_id, name, None, address).await
}

/// Always insert a fresh customer row. Used by the single-message path.
pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    org_id: &str,
    name: &str,
    phone: Option<&str>,
    address: Option<&str>,
) -> ServiceResult<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO customers (id, organization_id, name, phone, address)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(name)
    .bind(phone)
    .bind(address)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}
