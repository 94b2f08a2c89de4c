//! Organization lookups

use shared::models::organization::{BusinessProfile, OrgTier};
use sqlx::PgPool;

use crate::error::ServiceResult;

/// Resolve an organization's tier
pub async fn get_tier(pool: &PgPool, org_id: &str) -> ServiceResult<Option<OrgTier>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT tier FROM organizations WHERE id = $1")
        .bind(org_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(tier,)| OrgTier::parse_or_free(&tier)))
}

/// Fetch the business profile used by the invoice engine
pub async fn get_business_profile(
    pool: &PgPool,
    org_id: &str,
) -> ServiceResult<Option<BusinessProfile>> {
    let profile = sqlx::query_as::<_, BusinessProfile>(
        r#"
        SELECT organization_id, business_name, gst_number, tax_rate_percent,
               currency, address, phone
        FROM business_profiles
        WHERE organization_id = $1
        "#,
    )
    .bind(org_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}
