//! Shared types for the Kirana backend
//!
//! Common types used across crates: the unified error system, domain
//! models, and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Unified error system re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
