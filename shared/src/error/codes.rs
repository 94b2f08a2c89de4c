//! Unified error codes
//!
//! Error codes are u16 values organized by category range:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Organization / quota errors
//! - 4xxx: Order / invoice / job errors
//! - 8xxx: Upstream collaborator errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are serialized as plain u16 for cross-language compatibility with
/// API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// No usable credential on the request
    NotAuthenticated = 1001,
    /// Bearer token has expired
    TokenExpired = 1002,
    /// Bearer token failed verification
    TokenInvalid = 1003,
    /// API key unknown or inactive
    ApiKeyInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Endpoint requires organization context
    OrgContextMissing = 2002,

    // ==================== 3xxx: Organization / quota ====================
    /// Organization not found
    OrgNotFound = 3001,
    /// Business profile not configured for the organization
    BusinessProfileMissing = 3002,
    /// Sliding-window request cap exceeded
    RateLimited = 3101,

    // ==================== 4xxx: Order / invoice / job ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order status outside the allowed enumeration
    OrderStatusInvalid = 4002,
    /// Order has no invoice attached
    InvoiceMissing = 4101,
    /// Invoice sequence allocation lost an optimistic race
    InvoiceSequenceConflict = 4102,
    /// Queue job not found
    JobNotFound = 4301,

    // ==================== 8xxx: Upstream ====================
    /// LLM rejected the request (non-retriable 4xx)
    UpstreamBadRequest = 8001,
    /// LLM unreachable after retries
    UpstreamUnavailable = 8002,
    /// LLM response missing the required tool invocation
    ExtractionMalformed = 8003,
    /// Caller cancelled while the extraction was in flight
    ExtractionCancelled = 8004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Queue backend error
    QueueError = 9003,
    /// Configuration error
    ConfigError = 9004,
    /// Object store error
    StorageError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::ApiKeyInvalid => "Invalid API key",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::OrgContextMissing => "Organization context required",

            // Organization / quota
            ErrorCode::OrgNotFound => "Organization not found",
            ErrorCode::BusinessProfileMissing => "Business profile not configured",
            ErrorCode::RateLimited => "Too many requests, try again later",

            // Order / invoice / job
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderStatusInvalid => "Invalid order status",
            ErrorCode::InvoiceMissing => "Order has no invoice",
            ErrorCode::InvoiceSequenceConflict => "Invoice numbering conflict, retry the request",
            ErrorCode::JobNotFound => "Job not found",

            // Upstream
            ErrorCode::UpstreamBadRequest => "Extraction service rejected the request",
            ErrorCode::UpstreamUnavailable => "Extraction service unavailable",
            ErrorCode::ExtractionMalformed => "Extraction service returned a malformed response",
            ErrorCode::ExtractionCancelled => "Extraction cancelled",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::QueueError => "Queue backend error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::StorageError => "Object store error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when a u16 does not correspond to a known code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,
            6 => Self::InvalidFormat,
            7 => Self::RequiredField,
            1001 => Self::NotAuthenticated,
            1002 => Self::TokenExpired,
            1003 => Self::TokenInvalid,
            1004 => Self::ApiKeyInvalid,
            2001 => Self::PermissionDenied,
            2002 => Self::OrgContextMissing,
            3001 => Self::OrgNotFound,
            3002 => Self::BusinessProfileMissing,
            3101 => Self::RateLimited,
            4001 => Self::OrderNotFound,
            4002 => Self::OrderStatusInvalid,
            4101 => Self::InvoiceMissing,
            4102 => Self::InvoiceSequenceConflict,
            4301 => Self::JobNotFound,
            8001 => Self::UpstreamBadRequest,
            8002 => Self::UpstreamUnavailable,
            8003 => Self::ExtractionMalformed,
            8004 => Self::ExtractionCancelled,
            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            9003 => Self::QueueError,
            9004 => Self::ConfigError,
            9005 => Self::StorageError,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::NotAuthenticated,
            ErrorCode::PermissionDenied,
            ErrorCode::RateLimited,
            ErrorCode::OrderNotFound,
            ErrorCode::UpstreamBadRequest,
            ErrorCode::InternalError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(777), Err(InvalidErrorCode(777)));
    }

    #[test]
    fn test_serde_as_u16() {
        let json = serde_json::to_string(&ErrorCode::RateLimited).unwrap();
        assert_eq!(json, "3101");
        let back: ErrorCode = serde_json::from_str("3101").unwrap();
        assert_eq!(back, ErrorCode::RateLimited);
    }
}
