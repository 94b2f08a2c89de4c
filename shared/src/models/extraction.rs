//! Structured extraction payloads returned by the LLM client
//!
//! These are the post-coercion shapes; raw vendor JSON is retained
//! separately on the order as the audit copy.

use serde::{Deserialize, Serialize};

use super::order::Confidence;

/// One extracted line item. Numeric fields stay as f64 here: they are
/// converted to fixed-precision decimals at the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub product_name: String,
    /// Defaults to 1 when the model omitted it or returned nonsense
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Never invented: stays null when the conversation had no price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// A full extracted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub items: Vec<ExtractedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    pub confidence: Confidence,
}
