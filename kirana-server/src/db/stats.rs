//! Aggregate queries for the stats endpoint
//!
//! All scans are org-scoped and skip soft-deleted rows.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::ServiceResult;

/// Org-wide order statistics
#[derive(Debug, Clone, Serialize)]
pub struct OrgStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub confirmed_orders: i64,
    pub chat_orders: i64,
    pub total_revenue: Decimal,
}

pub async fn get_stats(pool: &PgPool, org_id: &str) -> ServiceResult<OrgStats> {
    let (total_orders, pending_orders, confirmed_orders): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'pending'),
               COUNT(*) FILTER (WHERE status = 'confirmed')
        FROM orders
        WHERE organization_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .fetch_one(pool)
    .await?;

    // Pre-tax order totals; invoices carry the tax
    let (total_revenue,): (Option<Decimal>,) = sqlx::query_as(
        r#"
        SELECT SUM(total_amount)
        FROM orders
        WHERE organization_id = $1
          AND deleted_at IS NULL
          AND status IN ('confirmed', 'fulfilled')
        "#,
    )
    .bind(org_id)
    .fetch_one(pool)
    .await?;

    let chat_orders = chat_orders_count(pool, org_id, None).await?;

    Ok(OrgStats {
        total_orders,
        pending_orders,
        confirmed_orders,
        chat_orders,
        total_revenue: total_revenue.unwrap_or(Decimal::ZERO),
    })
}

/// Count chat-log orders, optionally filtered by status
pub async fn chat_orders_count(
    pool: &PgPool,
    org_id: &str,
    status: Option<&str>,
) -> ServiceResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM orders
        WHERE organization_id = $1
          AND deleted_at IS NULL
          AND extraction_type = 'chat_log'
          AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(org_id)
    .bind(status)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
