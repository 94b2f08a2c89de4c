//! API key model
//!
//! Raw key material never reaches storage; only the SHA-256 hash and a
//! display-safe mask are kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ApiKey {
    pub id: Uuid,
    pub organization_id: String,
    /// Hex-encoded SHA-256 of the raw key
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// Display-safe mask, e.g. `kir_****3f9a`
    pub key_mask: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
