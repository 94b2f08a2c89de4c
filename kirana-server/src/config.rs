//! Server configuration
//!
//! Loaded from environment variables. Required secrets fail closed: every
//! missing variable is collected and reported in one error instead of
//! booting with a partial configuration.

use shared::error::{AppError, ErrorCode};

/// Tier rate limits (requests per window)
#[derive(Debug, Clone)]
pub struct TierLimits {
    pub free: u32,
    pub pro: u32,
    pub enterprise: u32,
    /// Sliding window length in seconds
    pub window_secs: u64,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Redis connection URL (queues)
    pub redis_url: String,
    /// HTTP port
    pub port: u16,
    /// Environment: development | production | test
    pub environment: String,

    /// LLM vendor API key
    pub llm_api_key: String,
    /// LLM vendor base URL
    pub llm_base_url: String,
    /// Model for single-message extraction
    pub llm_model: String,
    /// Model for chat-log extraction
    pub llm_chat_model: String,
    /// Per-attempt deadline in milliseconds
    pub llm_timeout_ms: u64,

    /// Identity provider expected audience
    pub idp_audience: String,
    /// Identity provider JWKS URL
    pub idp_jwks_url: String,

    /// Object store account name
    pub storage_account: String,
    /// Object store access key
    pub storage_access_key: String,
    /// Object store endpoint (S3-compatible)
    pub storage_endpoint: Option<String>,
    /// Container/bucket for invoice PDFs
    pub storage_container: String,

    /// Default business identity used when an organization has no profile
    pub default_business_name: String,
    pub default_gst_number: Option<String>,

    /// Per-tier rate limits
    pub tier_limits: TierLimits,

    /// Error reporting DSN (optional, forwarded to the reporter if set)
    pub error_reporting_dsn: Option<String>,
    /// Extra CA certificate for the DB connection (PEM, optional)
    pub database_ca_cert: Option<String>,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns a single error naming every missing required variable.
    pub fn from_env() -> Result<Self, AppError> {
        let mut missing = Vec::new();
        let mut required = |name: &str| -> String {
            match optional(name) {
                Some(v) => v,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let database_url = required("DATABASE_URL");
        let llm_api_key = required("LLM_API_KEY");
        let idp_audience = required("IDP_AUDIENCE");
        let idp_jwks_url = required("IDP_JWKS_URL");
        let storage_account = required("STORAGE_ACCOUNT");
        let storage_access_key = required("STORAGE_ACCESS_KEY");

        if !missing.is_empty() {
            return Err(AppError::with_message(
                ErrorCode::ConfigError,
                format!("Missing required environment variables: {}", missing.join(", ")),
            ));
        }

        Ok(Self {
            database_url,
            redis_url: optional("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".into()),
            port: parsed_or("PORT", 3000),
            environment: optional("ENVIRONMENT").unwrap_or_else(|| "development".into()),

            llm_api_key,
            llm_base_url: optional("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.anthropic.com".into()),
            llm_model: optional("LLM_MODEL").unwrap_or_else(|| "claude-haiku-4-5".into()),
            llm_chat_model: optional("LLM_CHAT_MODEL")
                .unwrap_or_else(|| "claude-sonnet-4-5".into()),
            llm_timeout_ms: parsed_or("LLM_TIMEOUT_MS", 60_000),

            idp_audience,
            idp_jwks_url,

            storage_account,
            storage_access_key,
            storage_endpoint: optional("STORAGE_ENDPOINT"),
            storage_container: optional("STORAGE_CONTAINER").unwrap_or_else(|| "invoices".into()),

            default_business_name: optional("DEFAULT_BUSINESS_NAME")
                .unwrap_or_else(|| "Kirana Store".into()),
            default_gst_number: optional("DEFAULT_GST_NUMBER"),

            tier_limits: TierLimits {
                free: parsed_or("RATE_LIMIT_FREE", 100),
                pro: parsed_or("RATE_LIMIT_PRO", 1000),
                enterprise: parsed_or("RATE_LIMIT_ENTERPRISE", 10000),
                window_secs: parsed_or("RATE_LIMIT_WINDOW_SECS", 900),
            },

            error_reporting_dsn: optional("ERROR_REPORTING_DSN"),
            database_ca_cert: optional("DATABASE_CA_CERT"),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test to avoid
    // interleaving with parallel test threads.
    #[test]
    fn test_fail_closed_lists_all_missing() {
        let keys = [
            "DATABASE_URL",
            "LLM_API_KEY",
            "IDP_AUDIENCE",
            "IDP_JWKS_URL",
            "STORAGE_ACCOUNT",
            "STORAGE_ACCESS_KEY",
        ];
        for k in keys {
            unsafe { std::env::remove_var(k) };
        }

        let err = Config::from_env().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
        for k in keys {
            assert!(err.message.contains(k), "missing {k} not reported: {}", err.message);
        }

        for k in keys {
            unsafe { std::env::set_var(k, "test-value") };
        }
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.environment, "development");
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.storage_container, "invoices");
        assert_eq!(config.tier_limits.window_secs, 900);
        assert_eq!(config.llm_timeout_ms, 60_000);

        for k in keys {
            unsafe { std::env::remove_var(k) };
        }
    }
}
