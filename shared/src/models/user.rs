//! User model: mirrors the identity provider's subject

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity. `id` is the identity provider's subject claim.
///
/// `organization_id` stays null until the user joins an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub organization_id: Option<String>,
    /// Role name resolved against the organization's roles table
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}
