//! Order model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoice::Invoice;

/// How the order entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    SingleMessage,
    ChatLog,
}

impl ExtractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleMessage => "single_message",
            Self::ChatLog => "chat_log",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_message" => Some(Self::SingleMessage),
            "chat_log" => Some(Self::ChatLog),
            _ => None,
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }

    /// Only the four enumerated states are accepted
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "fulfilled" => Some(Self::Fulfilled),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Coarse confidence level reported for chat-log extractions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Unknown strings fall back to `Medium`
    pub fn parse_or_medium(s: &str) -> Self {
        match s {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Extraction confidence: a numeric score for single-message orders,
/// a coarse level for chat-log orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Score(f64),
    Level(ConfidenceLevel),
}

/// One message of a chat log submitted for extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Normalized order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    /// Denormalized at extraction time; catalog linkage is optional
    pub product_name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    /// Null when the conversation never named a price
    pub price_per_unit: Option<Decimal>,
    pub total_price: Decimal,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub organization_id: String,
    pub customer_id: Uuid,
    /// Joined from the customer row for read convenience
    pub customer_name: Option<String>,
    pub extraction_type: ExtractionType,
    pub status: OrderStatus,
    pub confidence: Option<Confidence>,
    pub total_amount: Decimal,
    pub delivery_address: Option<String>,
    pub delivery_date: Option<String>,
    pub items: Vec<OrderItem>,
    /// Audit copy of the LLM payload, retained verbatim
    pub raw_ai_response: Option<serde_json::Value>,
    /// Verbatim extraction inputs, retained even when pruned for the LLM call
    pub raw_messages: Option<serde_json::Value>,
    pub invoice: Option<Invoice>,
    /// Allocated exactly once, when the invoice is attached
    pub invoice_sequence: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_closed_set() {
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("confirmed"), Some(OrderStatus::Confirmed));
        assert_eq!(OrderStatus::parse("fulfilled"), Some(OrderStatus::Fulfilled));
        assert_eq!(OrderStatus::parse("cancelled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse("PENDING"), None);
    }

    #[test]
    fn test_confidence_untagged_serde() {
        let score: Confidence = serde_json::from_str("0.85").unwrap();
        assert_eq!(score, Confidence::Score(0.85));

        let level: Confidence = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(level, Confidence::Level(ConfidenceLevel::High));

        assert_eq!(serde_json::to_string(&score).unwrap(), "0.85");
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"high\"");
    }

    #[test]
    fn test_confidence_level_fallback() {
        assert_eq!(
            ConfidenceLevel::parse_or_medium("very sure"),
            ConfidenceLevel::Medium
        );
        assert_eq!(ConfidenceLevel::parse_or_medium("low"), ConfidenceLevel::Low);
    }
}
