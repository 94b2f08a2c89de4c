//! Permission resolution
//!
//! A user's role name resolves to a permission set through the
//! organization's roles table. A hard-coded fallback map covers role rows
//! that predate the table (migration affordance) and is warn-logged every
//! time it fires. Any lookup failure denies.

use shared::models::role::Permission;
use sqlx::PgPool;

use crate::db;
use crate::error::ServiceResult;

/// Fallback permission sets for role names with no stored row
fn fallback_permissions(role: &str) -> Option<&'static [Permission]> {
    use Permission::*;
    match role {
        "owner" | "admin" => Some(&[
            ViewOrders,
            EditOrders,
            DeleteOrders,
            ViewPii,
            ManageUsers,
            ManageBilling,
            ManageApiKeys,
            ViewAnalytics,
        ]),
        "manager" => Some(&[ViewOrders, EditOrders, DeleteOrders, ViewPii, ViewAnalytics]),
        "staff" => Some(&[ViewOrders, EditOrders]),
        "viewer" => Some(&[ViewOrders]),
        _ => None,
    }
}

/// Whether `user_id` holds `permission` within `org_id`.
///
/// Fails closed: a user without a role, an unknown role with no fallback,
/// or any database error all deny.
pub async fn has_permission(
    pool: &PgPool,
    user_id: &str,
    org_id: &str,
    permission: Permission,
) -> ServiceResult<bool> {
    let Some(user) = db::users::get(pool, user_id).await? else {
        return Ok(false);
    };

    // The user must belong to the organization being queried
    if user.organization_id.as_deref() != Some(org_id) {
        return Ok(false);
    }

    let Some(role_name) = user.role.as_deref() else {
        return Ok(false);
    };

    match db::roles::get_permissions(pool, org_id, role_name).await? {
        Some(stored) => Ok(stored
            .iter()
            .filter_map(|name| Permission::parse(name))
            .any(|p| p == permission)),
        None => match fallback_permissions(role_name) {
            Some(set) => {
                tracing::warn!(
                    org_id = %org_id,
                    role = %role_name,
                    "Role row missing, using fallback permission set"
                );
                Ok(set.contains(&permission))
            }
            None => Ok(false),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_sets() {
        assert!(fallback_permissions("admin").unwrap().contains(&Permission::ViewPii));
        assert!(fallback_permissions("staff").unwrap().contains(&Permission::EditOrders));
        assert!(!fallback_permissions("staff").unwrap().contains(&Permission::ViewPii));
        assert!(!fallback_permissions("viewer").unwrap().contains(&Permission::DeleteOrders));
        assert!(fallback_permissions("mystery_role").is_none());
    }
}
