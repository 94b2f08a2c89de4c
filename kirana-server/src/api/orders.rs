//! Order endpoints: list, detail, status transitions, strict edit, delete

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::order::{ExtractionType, Order, OrderStatus};
use uuid::Uuid;
use validator::Validate;

use super::{ApiResult, AppJson, check_valid};
use crate::auth::{AuthContext, org_id};
use crate::db::orders::{self, NewOrderItem, OrderPatch};
use crate::state::AppState;

/// GET /api/orders
#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Optional filter: `single_message` or `chat_log`
    pub extraction_type: Option<String>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Order>> {
    let org = org_id(&auth)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let extraction_type = match query.extraction_type.as_deref() {
        None => None,
        Some(raw) => Some(ExtractionType::parse(raw).ok_or_else(|| {
            AppError::validation(format!("Invalid extraction type: {raw}"))
        })?),
    };

    let orders = orders::list(&state.pool, org, extraction_type, limit, offset)
        .await
        .map_err(AppError::from)?;
    Ok(Json(orders))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Order> {
    let org = org_id(&auth)?;
    let order = orders::get(&state.pool, org, id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// PATCH /api/orders/:id
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<StatusRequest>,
) -> ApiResult<Order> {
    let org = org_id(&auth)?;
    let status = OrderStatus::parse(&req.status).ok_or_else(|| {
        AppError::with_message(
            ErrorCode::OrderStatusInvalid,
            format!("Invalid order status: {}", req.status),
        )
    })?;

    let order = orders::update_status(&state.pool, org, id, status)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// PATCH /api/orders/:id/edit: strict allow-list patch.
///
/// Unknown fields are rejected outright; new editable fields are added
/// here deliberately.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EditRequest {
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub delivery_date: Option<String>,
    pub status: Option<String>,
    #[validate(nested)]
    pub items: Option<Vec<EditItem>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EditItem {
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(range(min = 0.001, max = 100_000.0))]
    pub quantity: f64,
    pub unit: Option<String>,
    #[validate(range(min = 0.0, max = 10_000_000.0))]
    pub price: Option<f64>,
}

fn patch_from_request(req: EditRequest) -> Result<OrderPatch, AppError> {
    let status = match req.status.as_deref() {
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::OrderStatusInvalid,
                format!("Invalid order status: {raw}"),
            )
        })?),
        None => None,
    };

    let items = req.items.map(|items| {
        items
            .into_iter()
            .map(|item| NewOrderItem {
                product_name: item.product_name,
                quantity: Decimal::from_f64(item.quantity).unwrap_or(Decimal::ONE),
                unit: item.unit,
                price_per_unit: item.price.and_then(Decimal::from_f64),
            })
            .collect()
    });

    Ok(OrderPatch {
        delivery_address: req.delivery_address,
        delivery_date: req.delivery_date,
        status,
        items,
    })
}

pub async fn edit_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<EditRequest>,
) -> ApiResult<Order> {
    let org = org_id(&auth)?;
    check_valid(&req)?;
    let patch = patch_from_request(req)?;

    let order = orders::update_details(&state.pool, org, id, patch)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// DELETE /api/orders/:id: soft delete
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    let org = org_id(&auth)?;
    let matched = orders::soft_delete(&state.pool, org, id)
        .await
        .map_err(AppError::from)?;

    if !matched {
        return Err(AppError::new(ErrorCode::OrderNotFound));
    }
    Ok(Json(ApiResponse::ok("Order deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_rejects_unknown_fields() {
        let err = serde_json::from_str::<EditRequest>(
            r#"{"delivery_address": "42 MG Road", "total_amount": 999}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_edit_accepts_allow_list() {
        let req: EditRequest = serde_json::from_str(
            r#"{
                "delivery_address": "42 MG Road, Bangalore",
                "status": "confirmed",
                "items": [{"product_name": "Rice", "quantity": 5, "price": 120}]
            }"#,
        )
        .unwrap();
        let patch = patch_from_request(req).unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Confirmed));
        let items = patch.items.unwrap();
        assert_eq!(items[0].total_price(), Decimal::from(600));
    }

    #[test]
    fn test_edit_rejects_unknown_status() {
        let req: EditRequest = serde_json::from_str(r#"{"status": "shipped"}"#).unwrap();
        assert!(patch_from_request(req).is_err());
    }
}
