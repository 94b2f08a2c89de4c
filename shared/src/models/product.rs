//! Product model (optional per-organization catalog)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub organization_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub default_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}
