//! Order storage: tenant-scoped reads, transactional writes, and the
//! serialized per-organization invoice sequence allocation.
//!
//! Every predicate carries `organization_id = $org` and, for application
//! reads, `deleted_at IS NULL`. A row belonging to another organization is
//! indistinguishable from an absent one.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::invoice::Invoice;
use shared::models::order::{Confidence, ConfidenceLevel, ExtractionType, Order, OrderItem, OrderStatus};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::customers;
use crate::error::{ServiceError, ServiceResult};

// ── Row types ──

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    organization_id: String,
    customer_id: Uuid,
    customer_name: Option<String>,
    extraction_type: String,
    status: String,
    confidence_level: Option<String>,
    confidence_score: Option<f64>,
    total_amount: Decimal,
    delivery_address: Option<String>,
    delivery_date: Option<String>,
    raw_ai_response: Option<Value>,
    raw_messages: Option<Value>,
    invoice: Option<Value>,
    invoice_sequence: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_name: String,
    quantity: Decimal,
    unit: Option<String>,
    price_per_unit: Option<Decimal>,
    total_price: Decimal,
}

const ORDER_COLUMNS: &str = r#"
    o.id, o.organization_id, o.customer_id, c.name AS customer_name,
    o.extraction_type, o.status, o.confidence_level, o.confidence_score,
    o.total_amount, o.delivery_address, o.delivery_date,
    o.raw_ai_response, o.raw_messages, o.invoice, o.invoice_sequence,
    o.created_at, o.updated_at
"#;

// ── Input types ──

/// One line of a new order, already converted to fixed precision
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub price_per_unit: Option<Decimal>,
}

/// Money rounding: 2 decimal places, half-up
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl NewOrderItem {
    pub fn total_price(&self) -> Decimal {
        round_money(self.quantity * self.price_per_unit.unwrap_or(Decimal::ZERO))
    }
}

/// A new order record produced by the extraction path
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub extraction_type: ExtractionType,
    pub customer_name: Option<String>,
    pub confidence: Option<Confidence>,
    pub total_amount: Decimal,
    pub delivery_address: Option<String>,
    pub delivery_date: Option<String>,
    pub items: Vec<NewOrderItem>,
    /// Verbatim LLM payload, the audit trail
    pub raw_ai_response: Value,
    /// Verbatim inputs (single message or full chat log)
    pub raw_messages: Value,
}

/// Strict allow-list patch for the edit endpoint.
///
/// Adding a field here is a deliberate decision; unknown inbound fields
/// are rejected at the HTTP boundary.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub delivery_address: Option<String>,
    pub delivery_date: Option<String>,
    pub status: Option<OrderStatus>,
    pub items: Option<Vec<NewOrderItem>>,
}

// ── Mapping ──

fn confidence_from_columns(level: Option<&str>, score: Option<f64>) -> Option<Confidence> {
    match (level, score) {
        (Some(l), _) => Some(Confidence::Level(ConfidenceLevel::parse_or_medium(l))),
        (None, Some(s)) => Some(Confidence::Score(s)),
        (None, None) => None,
    }
}

/// Rebuild items from the audit JSON for orders ingested before line
/// normalization existed. Normalized rows always win when present.
fn items_from_audit(raw: &Value) -> Vec<OrderItem> {
    raw.get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let product_name = item.get("product_name")?.as_str()?.to_string();
                    let quantity = item
                        .get("quantity")
                        .and_then(Value::as_f64)
                        .and_then(Decimal::from_f64)
                        .unwrap_or(Decimal::ONE);
                    let price_per_unit = item
                        .get("price")
                        .and_then(Value::as_f64)
                        .and_then(Decimal::from_f64)
                        .map(round_money);
                    Some(OrderItem {
                        id: Uuid::nil(),
                        product_name,
                        quantity,
                        unit: item.get("unit").and_then(Value::as_str).map(String::from),
                        price_per_unit,
                        total_price: round_money(
                            quantity * price_per_unit.unwrap_or(Decimal::ZERO),
                        ),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn assemble_order(row: OrderRow, item_rows: Vec<OrderItemRow>) -> ServiceResult<Order> {
    let items: Vec<OrderItem> = if item_rows.is_empty() {
        row.raw_ai_response
            .as_ref()
            .map(items_from_audit)
            .unwrap_or_default()
    } else {
        item_rows
            .into_iter()
            .map(|r| OrderItem {
                id: r.id,
                product_name: r.product_name,
                quantity: r.quantity,
                unit: r.unit,
                price_per_unit: r.price_per_unit,
                total_price: r.total_price,
            })
            .collect()
    };

    let invoice: Option<Invoice> = match row.invoice {
        Some(value) => Some(serde_json::from_value(value)?),
        None => None,
    };

    let extraction_type = ExtractionType::parse(&row.extraction_type).ok_or_else(|| {
        ServiceError::Db(format!("unknown extraction_type: {}", row.extraction_type).into())
    })?;
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| ServiceError::Db(format!("unknown order status: {}", row.status).into()))?;

    Ok(Order {
        id: row.id,
        organization_id: row.organization_id,
        customer_id: row.customer_id,
        customer_name: row.customer_name,
        extraction_type,
        status,
        confidence: confidence_from_columns(
            row.confidence_level.as_deref(),
            row.confidence_score,
        ),
        total_amount: row.total_amount,
        delivery_address: row.delivery_address,
        delivery_date: row.delivery_date,
        items,
        raw_ai_response: row.raw_ai_response,
        raw_messages: row.raw_messages,
        invoice,
        invoice_sequence: row.invoice_sequence,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn load_items(
    tx: &mut Transaction<'_, Postgres>,
    org_id: &str,
    order_ids: &[Uuid],
) -> ServiceResult<Vec<OrderItemRow>> {
    if order_ids.is_empty() {
        return Ok(vec![]);
    }
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, product_name, quantity, unit, price_per_unit, total_price
        FROM order_items
        WHERE organization_id = $1 AND order_id = ANY($2)
        ORDER BY created_at, id
        "#,
    )
    .bind(org_id)
    .bind(order_ids)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    org_id: &str,
    order_id: Uuid,
    items: &[NewOrderItem],
) -> ServiceResult<()> {
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = items.iter().map(|_| Uuid::new_v4()).collect();
    let order_ids: Vec<Uuid> = items.iter().map(|_| order_id).collect();
    let org_ids: Vec<String> = items.iter().map(|_| org_id.to_string()).collect();
    let names: Vec<String> = items.iter().map(|i| i.product_name.clone()).collect();
    let quantities: Vec<Decimal> = items.iter().map(|i| i.quantity).collect();
    let units: Vec<Option<String>> = items.iter().map(|i| i.unit.clone()).collect();
    let prices: Vec<Option<Decimal>> = items.iter().map(|i| i.price_per_unit).collect();
    let totals: Vec<Decimal> = items.iter().map(NewOrderItem::total_price).collect();

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, organization_id, product_name, quantity, unit,
            price_per_unit, total_price
        )
        SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::text[],
                             $5::numeric[], $6::text[], $7::numeric[], $8::numeric[])
        "#,
    )
    .bind(&ids)
    .bind(&order_ids)
    .bind(&org_ids)
    .bind(&names)
    .bind(&quantities)
    .bind(&units)
    .bind(&prices)
    .bind(&totals)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn confidence_columns(confidence: Option<Confidence>) -> (Option<String>, Option<f64>) {
    match confidence {
        Some(Confidence::Level(level)) => (Some(level.as_str().to_string()), None),
        Some(Confidence::Score(score)) => (None, Some(score)),
        None => (None, None),
    }
}

// ── Reads ──

/// Newest-first page of orders, optionally restricted to one extraction type
pub async fn list(
    pool: &PgPool,
    org_id: &str,
    extraction_type: Option<ExtractionType>,
    limit: i64,
    offset: i64,
) -> ServiceResult<Vec<Order>> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders o
        LEFT JOIN customers c ON c.id = o.customer_id AND c.organization_id = o.organization_id
        WHERE o.organization_id = $1
          AND o.deleted_at IS NULL
          AND ($2::text IS NULL OR o.extraction_type = $2)
        ORDER BY o.created_at DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(org_id)
    .bind(extraction_type.map(|t| t.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows = load_items(&mut tx, org_id, &ids).await?;
    tx.commit().await?;

    let mut by_order: std::collections::HashMap<Uuid, Vec<OrderItemRow>> =
        std::collections::HashMap::new();
    for item in item_rows {
        by_order.entry(item.order_id).or_default().push(item);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            assemble_order(row, items)
        })
        .collect()
}

/// Fetch one order; absent, soft-deleted and cross-tenant rows are all
/// `OrderNotFound`.
pub async fn get(pool: &PgPool, org_id: &str, id: Uuid) -> ServiceResult<Order> {
    let mut tx = pool.begin().await?;
    let order = get_in_tx(&mut tx, org_id, id, false).await?;
    tx.commit().await?;
    Ok(order)
}

async fn get_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    org_id: &str,
    id: Uuid,
    lock_row: bool,
) -> ServiceResult<Order> {
    let locking = if lock_row { "FOR UPDATE OF o" } else { "" };
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders o
        LEFT JOIN customers c ON c.id = o.customer_id AND c.organization_id = o.organization_id
        WHERE o.organization_id = $1 AND o.id = $2 AND o.deleted_at IS NULL
        {locking}
        "#
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    let items = load_items(tx, org_id, &[row.id]).await?;
    assemble_order(row, items)
}

// ── Writes ──

/// Create an order with its customer and line items in one transaction.
///
/// Chat orders reuse an existing customer by `(org, name)`; single-message
/// orders always create a fresh one.
pub async fn add(pool: &PgPool, org_id: &str, record: NewOrder) -> ServiceResult<Order> {
    let mut tx = pool.begin().await?;

    let customer_name = record.customer_name.as_deref().unwrap_or("Customer");
    let customer_id = match record.extraction_type {
        ExtractionType::ChatLog => {
            customers::find_or_create_by_name(
                &mut tx,
                org_id,
                customer_name,
                record.delivery_address.as_deref(),
            )
            .await?
        }
        ExtractionType::SingleMessage => {
            customers::create(
                &mut tx,
                org_id,
                customer_name,
                None,
                record.delivery_address.as_deref(),
            )
            .await?
        }
    };

    let (confidence_level, confidence_score) = confidence_columns(record.confidence);
    let order_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, organization_id, customer_id, extraction_type, status,
            confidence_level, confidence_score, total_amount,
            delivery_address, delivery_date, raw_ai_response, raw_messages
        )
        VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order_id)
    .bind(org_id)
    .bind(customer_id)
    .bind(record.extraction_type.as_str())
    .bind(&confidence_level)
    .bind(confidence_score)
    .bind(record.total_amount)
    .bind(&record.delivery_address)
    .bind(&record.delivery_date)
    .bind(&record.raw_ai_response)
    .bind(&record.raw_messages)
    .execute(&mut *tx)
    .await?;

    insert_items(&mut tx, org_id, order_id, &record.items).await?;

    let order = get_in_tx(&mut tx, org_id, order_id, false).await?;
    tx.commit().await?;
    Ok(order)
}

/// Transition an order's status. The status enum is closed; parsing
/// happens at the boundary, so any value here is already legal.
pub async fn update_status(
    pool: &PgPool,
    org_id: &str,
    id: Uuid,
    status: OrderStatus,
) -> ServiceResult<Order> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = $3, updated_at = NOW()
        WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    }

    get(pool, org_id, id).await
}

/// Partial update under the strict allow-list. An `items` change replaces
/// all lines (delete-then-reinsert) inside the same transaction and
/// recomputes the denormalized total.
pub async fn update_details(
    pool: &PgPool,
    org_id: &str,
    id: Uuid,
    patch: OrderPatch,
) -> ServiceResult<Order> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            delivery_address = COALESCE($3, delivery_address),
            delivery_date = COALESCE($4, delivery_date),
            status = COALESCE($5, status),
            updated_at = NOW()
        WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .bind(id)
    .bind(&patch.delivery_address)
    .bind(&patch.delivery_date)
    .bind(patch.status.map(|s| s.as_str()))
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    }

    if let Some(items) = &patch.items {
        sqlx::query("DELETE FROM order_items WHERE organization_id = $1 AND order_id = $2")
            .bind(org_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        insert_items(&mut tx, org_id, id, items).await?;

        let total: Decimal = items.iter().map(NewOrderItem::total_price).sum();
        sqlx::query(
            "UPDATE orders SET total_amount = $3 WHERE organization_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .bind(round_money(total))
        .execute(&mut *tx)
        .await?;
    }

    let order = get_in_tx(&mut tx, org_id, id, false).await?;
    tx.commit().await?;
    Ok(order)
}

/// Soft delete. Returns whether a row was matched.
pub async fn soft_delete(pool: &PgPool, org_id: &str, id: Uuid) -> ServiceResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET deleted_at = NOW()
        WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Attach an already-computed invoice (idempotent retries that hold a
/// sequence). Forces the confirmed status.
pub async fn attach_invoice(
    pool: &PgPool,
    org_id: &str,
    order_id: Uuid,
    invoice: &Invoice,
    sequence: i32,
) -> ServiceResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET invoice = $3, invoice_sequence = $4, status = 'confirmed', updated_at = NOW()
        WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .bind(order_id)
    .bind(serde_json::to_value(invoice)?)
    .bind(sequence)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    }
    Ok(())
}

/// Allocate the next per-organization invoice sequence and attach the
/// generated invoice, in one serialized transaction.
///
/// Locking the organization row serializes allocation within one tenant;
/// other tenants proceed in parallel. Soft-deleted orders keep their
/// sequence, so the max() scan ignores `deleted_at`: sequences are never
/// reclaimed.
///
/// Calling this again for an order that already holds a sequence returns
/// the stored invoice unchanged.
pub async fn generate_and_attach_invoice<F>(
    pool: &PgPool,
    org_id: &str,
    order_id: Uuid,
    generator: F,
) -> ServiceResult<(Order, Invoice)>
where
    F: FnOnce(&Order, i32) -> Result<Invoice, AppError>,
{
    let mut tx = pool.begin().await?;

    // Lock the order row so a concurrent duplicate request serializes
    // here and then takes the idempotent path below
    let order = get_in_tx(&mut tx, org_id, order_id, true).await?;

    // Idempotent retry: the invoice is immutable once attached
    if let (Some(invoice), Some(_)) = (&order.invoice, order.invoice_sequence) {
        let invoice = invoice.clone();
        tx.commit().await?;
        return Ok((order, invoice));
    }

    // Per-org write lock; tenants never block each other
    let locked: Option<(String,)> =
        sqlx::query_as("SELECT id FROM organizations WHERE id = $1 FOR UPDATE")
            .bind(org_id)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        return Err(AppError::new(ErrorCode::OrgNotFound).into());
    }

    let (max_seq,): (Option<i32>,) = sqlx::query_as(
        "SELECT MAX(invoice_sequence) FROM orders WHERE organization_id = $1",
    )
    .bind(org_id)
    .fetch_one(&mut *tx)
    .await?;
    let next_seq = max_seq.unwrap_or(0) + 1;

    let invoice = generator(&order, next_seq)?;

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET invoice = $3, invoice_sequence = $4, status = 'confirmed', updated_at = NOW()
        WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(org_id)
    .bind(order_id)
    .bind(serde_json::to_value(&invoice)?)
    .bind(next_seq)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    }

    tx.commit().await?;

    let mut confirmed = order;
    confirmed.status = OrderStatus::Confirmed;
    confirmed.invoice = Some(invoice.clone());
    confirmed.invoice_sequence = Some(next_seq);
    Ok((confirmed, invoice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_from_audit_fallback() {
        let raw = json!({
            "items": [
                {"product_name": "Basmati Rice", "quantity": 5.0, "unit": "kg", "price": 120.0},
                {"product_name": "Toor Dal", "quantity": 2.0, "price": 95.0},
                {"quantity": 3.0}
            ]
        });
        let items = items_from_audit(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_name, "Basmati Rice");
        assert_eq!(items[0].total_price, Decimal::from(600));
        assert_eq!(items[1].total_price, Decimal::from(190));
        assert_eq!(items[1].unit, None);
    }

    #[test]
    fn test_items_from_audit_missing_quantity_defaults() {
        let raw = json!({"items": [{"product_name": "Atta"}]});
        let items = items_from_audit(&raw);
        assert_eq!(items[0].quantity, Decimal::ONE);
        assert_eq!(items[0].price_per_unit, None);
        assert_eq!(items[0].total_price, Decimal::ZERO);
    }

    #[test]
    fn test_confidence_columns_roundtrip() {
        let (level, score) = confidence_columns(Some(Confidence::Level(ConfidenceLevel::High)));
        assert_eq!(level.as_deref(), Some("high"));
        assert_eq!(score, None);
        assert_eq!(
            confidence_from_columns(level.as_deref(), score),
            Some(Confidence::Level(ConfidenceLevel::High))
        );

        let (level, score) = confidence_columns(Some(Confidence::Score(0.7)));
        assert_eq!(level, None);
        assert_eq!(
            confidence_from_columns(level.as_deref(), score),
            Some(Confidence::Score(0.7))
        );

        assert_eq!(confidence_from_columns(None, None), None);
    }

    #[test]
    fn test_new_item_total_rounds() {
        let item = NewOrderItem {
            product_name: "Ghee".into(),
            quantity: "3".parse().unwrap(),
            unit: None,
            price_per_unit: Some("33.335".parse().unwrap()),
        };
        assert_eq!(item.total_price(), "100.01".parse::<Decimal>().unwrap());
    }
}
