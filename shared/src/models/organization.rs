//! Organization (tenant root) and business profile models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Subscription tier, drives rate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrgTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl OrgTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parse a tier name; unknown values fall back to `Free` (the cheapest quota)
    pub fn parse_or_free(s: &str) -> Self {
        match s {
            "pro" => Self::Pro,
            "enterprise" => Self::Enterprise,
            _ => Self::Free,
        }
    }
}

/// Organization: the tenant root. Created externally, never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub gst_number: Option<String>,
    /// Stored as text; parse via [`OrgTier::parse_or_free`]
    pub tier: String,
}

/// Business identity used by the invoice engine (1:1 with organization)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BusinessProfile {
    pub organization_id: String,
    pub business_name: String,
    pub gst_number: Option<String>,
    /// Tax rate in percent (e.g. 18.0)
    pub tax_rate_percent: Decimal,
    pub currency: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse_fallback() {
        assert_eq!(OrgTier::parse_or_free("pro"), OrgTier::Pro);
        assert_eq!(OrgTier::parse_or_free("enterprise"), OrgTier::Enterprise);
        assert_eq!(OrgTier::parse_or_free("free"), OrgTier::Free);
        assert_eq!(OrgTier::parse_or_free("gold"), OrgTier::Free);
    }
}
