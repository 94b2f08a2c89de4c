//! Role model (RBAC, scoped per organization)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed permission enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewOrders,
    EditOrders,
    DeleteOrders,
    ViewPii,
    ManageUsers,
    ManageBilling,
    ManageApiKeys,
    ViewAnalytics,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewOrders => "view_orders",
            Self::EditOrders => "edit_orders",
            Self::DeleteOrders => "delete_orders",
            Self::ViewPii => "view_pii",
            Self::ManageUsers => "manage_users",
            Self::ManageBilling => "manage_billing",
            Self::ManageApiKeys => "manage_api_keys",
            Self::ViewAnalytics => "view_analytics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view_orders" => Some(Self::ViewOrders),
            "edit_orders" => Some(Self::EditOrders),
            "delete_orders" => Some(Self::DeleteOrders),
            "view_pii" => Some(Self::ViewPii),
            "manage_users" => Some(Self::ManageUsers),
            "manage_billing" => Some(Self::ManageBilling),
            "manage_api_keys" => Some(Self::ManageApiKeys),
            "view_analytics" => Some(Self::ViewAnalytics),
            _ => None,
        }
    }
}

/// Role entity: a named permission set within one organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Role {
    pub id: Uuid,
    pub organization_id: String,
    pub name: String,
    /// Permission names; unknown entries are ignored at resolution time
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_roundtrip() {
        for p in [
            Permission::ViewOrders,
            Permission::EditOrders,
            Permission::DeleteOrders,
            Permission::ViewPii,
            Permission::ManageUsers,
            Permission::ManageBilling,
            Permission::ManageApiKeys,
            Permission::ViewAnalytics,
        ] {
            assert_eq!(Permission::parse(p.as_str()), Some(p));
        }
        assert_eq!(Permission::parse("superuser"), None);
    }

    #[test]
    fn test_permission_serde_snake_case() {
        let json = serde_json::to_string(&Permission::ViewPii).unwrap();
        assert_eq!(json, "\"view_pii\"");
    }
}
