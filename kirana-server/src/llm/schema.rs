//! Tool schema, system prompt and payload coercion
//!
//! The model is forced to answer through a single tool whose input schema
//! mirrors [`ExtractedOrder`]. Whatever comes back is coerced defensively:
//! the vendor payload is audit data, not trusted input.

use serde_json::{Value, json};
use shared::models::extraction::{ExtractedItem, ExtractedOrder};
use shared::models::order::{Confidence, ConfidenceLevel, ExtractionType};

/// Tool name the model must invoke
pub const TOOL_NAME: &str = "record_order";

/// System prompt shared by both extraction modes. Marked as a long-lived
/// cache block on the wire.
pub const SYSTEM_PROMPT: &str = "You extract structured purchase orders from informal \
chat messages sent to small Indian businesses. Messages are code-mixed across Hindi, \
English and regional languages, often with transliterated product names, local units \
(kilo, paav, dozen) and shorthand quantities. Record every product the customer asks \
for with its quantity and unit. Record a price only when the conversation states one; \
never guess prices. Capture the delivery address and requested date when mentioned. \
Use the record_order tool exactly once with your best reading of the conversation.";

/// JSON schema for the extraction tool input
pub fn tool_schema(kind: ExtractionType) -> Value {
    let confidence = match kind {
        ExtractionType::SingleMessage => json!({
            "type": "number",
            "minimum": 0,
            "maximum": 1,
            "description": "How certain the extraction is, 0 to 1"
        }),
        ExtractionType::ChatLog => json!({
            "type": "string",
            "enum": ["high", "medium", "low"],
            "description": "How certain the extraction is"
        }),
    };

    json!({
        "type": "object",
        "properties": {
            "customer_name": {
                "type": "string",
                "description": "Customer name if identifiable from the messages"
            },
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "product_name": {"type": "string"},
                        "quantity": {"type": "number"},
                        "unit": {"type": "string"},
                        "price": {"type": "number", "description": "Per-unit price, only if stated"}
                    },
                    "required": ["product_name"]
                }
            },
            "delivery_address": {"type": "string"},
            "delivery_date": {"type": "string"},
            "total_amount": {"type": "number"},
            "confidence": confidence
        },
        "required": ["items", "confidence"]
    })
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn coerce_price(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p >= 0.0)
}

fn coerce_quantity(value: Option<&Value>) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(q) if q.is_finite() && q > 0.0 => q,
        _ => 1.0,
    }
}

fn coerce_confidence(value: Option<&Value>, kind: ExtractionType) -> Confidence {
    match kind {
        ExtractionType::SingleMessage => {
            let score = value.and_then(Value::as_f64).unwrap_or(0.5);
            Confidence::Score(score.clamp(0.0, 1.0))
        }
        ExtractionType::ChatLog => {
            let level = value
                .and_then(Value::as_str)
                .map(ConfidenceLevel::parse_or_medium)
                .unwrap_or(ConfidenceLevel::Medium);
            Confidence::Level(level)
        }
    }
}

/// Coerce a raw tool input into an [`ExtractedOrder`].
///
/// - `quantity` defaults to 1 on missing or nonsensical values
/// - `price` stays null when absent: prices are never invented
/// - numeric confidence is clamped to [0, 1]
/// - enumerated confidence falls back to "medium" on unknown strings
pub fn coerce_extracted(input: &Value, kind: ExtractionType) -> ExtractedOrder {
    let items = input
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let product_name = coerce_string(item.get("product_name"))?;
                    Some(ExtractedItem {
                        product_name,
                        quantity: coerce_quantity(item.get("quantity")),
                        unit: coerce_string(item.get("unit")),
                        price: coerce_price(item.get("price")),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    ExtractedOrder {
        customer_name: coerce_string(input.get("customer_name")),
        items,
        delivery_address: coerce_string(input.get("delivery_address")),
        delivery_date: coerce_string(input.get("delivery_date")),
        total_amount: input.get("total_amount").and_then(Value::as_f64),
        confidence: coerce_confidence(input.get("confidence"), kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() {
        let input = json!({
            "items": [
                {"product_name": "Rice"},
                {"product_name": "Dal", "quantity": -3},
                {"product_name": "Atta", "quantity": "two"},
                {"product_name": "Oil", "quantity": 2.5}
            ],
            "confidence": 0.9
        });
        let out = coerce_extracted(&input, ExtractionType::SingleMessage);
        assert_eq!(out.items[0].quantity, 1.0);
        assert_eq!(out.items[1].quantity, 1.0);
        assert_eq!(out.items[2].quantity, 1.0);
        assert_eq!(out.items[3].quantity, 2.5);
    }

    #[test]
    fn test_price_never_invented() {
        let input = json!({
            "items": [
                {"product_name": "Rice"},
                {"product_name": "Dal", "price": -5},
                {"product_name": "Atta", "price": 42.5}
            ],
            "confidence": 0.9
        });
        let out = coerce_extracted(&input, ExtractionType::SingleMessage);
        assert_eq!(out.items[0].price, None);
        assert_eq!(out.items[1].price, None);
        assert_eq!(out.items[2].price, Some(42.5));
    }

    #[test]
    fn test_numeric_confidence_clamped() {
        let high = json!({"items": [], "confidence": 1.7});
        let out = coerce_extracted(&high, ExtractionType::SingleMessage);
        assert_eq!(out.confidence, Confidence::Score(1.0));

        let low = json!({"items": [], "confidence": -0.2});
        let out = coerce_extracted(&low, ExtractionType::SingleMessage);
        assert_eq!(out.confidence, Confidence::Score(0.0));
    }

    #[test]
    fn test_enum_confidence_fallback() {
        let odd = json!({"items": [], "confidence": "extremely sure"});
        let out = coerce_extracted(&odd, ExtractionType::ChatLog);
        assert_eq!(out.confidence, Confidence::Level(ConfidenceLevel::Medium));

        let known = json!({"items": [], "confidence": "high"});
        let out = coerce_extracted(&known, ExtractionType::ChatLog);
        assert_eq!(out.confidence, Confidence::Level(ConfidenceLevel::High));
    }

    #[test]
    fn test_nameless_items_dropped() {
        let input = json!({
            "items": [{"quantity": 5}, {"product_name": "  "}, {"product_name": "Dal"}],
            "confidence": "high"
        });
        let out = coerce_extracted(&input, ExtractionType::ChatLog);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].product_name, "Dal");
    }

    #[test]
    fn test_schema_confidence_shape_differs_by_kind() {
        let single = tool_schema(ExtractionType::SingleMessage);
        assert_eq!(single["properties"]["confidence"]["type"], "number");

        let chat = tool_schema(ExtractionType::ChatLog);
        assert_eq!(chat["properties"]["confidence"]["type"], "string");
    }
}
