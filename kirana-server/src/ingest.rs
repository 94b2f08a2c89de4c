//! Bridge from validated LLM extractions to storage records
//!
//! Shared by the synchronous extraction endpoints and the queue worker so
//! both paths persist identically.

use rust_decimal::prelude::*;
use serde_json::Value;
use shared::models::extraction::ExtractedOrder;
use shared::models::order::ExtractionType;

use crate::db::orders::{NewOrder, NewOrderItem};

fn money(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn quantity(value: f64) -> Decimal {
    Decimal::from_f64(value).filter(|q| *q > Decimal::ZERO).unwrap_or(Decimal::ONE)
}

/// Build a storage record from an extraction.
///
/// `raw_ai_response` is the verbatim vendor payload; `raw_messages` the
/// verbatim inputs. Both are retained regardless of later failures.
pub fn new_order_from_extraction(
    extraction_type: ExtractionType,
    extracted: &ExtractedOrder,
    raw_ai_response: Value,
    raw_messages: Value,
) -> NewOrder {
    let items: Vec<NewOrderItem> = extracted
        .items
        .iter()
        .map(|item| NewOrderItem {
            product_name: item.product_name.clone(),
            quantity: quantity(item.quantity),
            unit: item.unit.clone(),
            price_per_unit: item.price.map(money),
        })
        .collect();

    let computed: Decimal = items.iter().map(NewOrderItem::total_price).sum();
    let total_amount = extracted.total_amount.map(money).unwrap_or(computed);

    NewOrder {
        extraction_type,
        customer_name: extracted.customer_name.clone(),
        confidence: Some(extracted.confidence),
        total_amount,
        delivery_address: extracted.delivery_address.clone(),
        delivery_date: extracted.delivery_date.clone(),
        items,
        raw_ai_response,
        raw_messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::models::extraction::ExtractedItem;
    use shared::models::order::{Confidence, ConfidenceLevel};

    fn extraction() -> ExtractedOrder {
        ExtractedOrder {
            customer_name: Some("Rahul Sharma".into()),
            items: vec![
                ExtractedItem {
                    product_name: "Basmati Rice".into(),
                    quantity: 5.0,
                    unit: Some("kg".into()),
                    price: Some(120.0),
                },
                ExtractedItem {
                    product_name: "Toor Dal".into(),
                    quantity: 2.0,
                    unit: Some("kg".into()),
                    price: Some(95.0),
                },
            ],
            delivery_address: Some("42 MG Road, Bangalore".into()),
            delivery_date: None,
            total_amount: Some(790.0),
            confidence: Confidence::Level(ConfidenceLevel::High),
        }
    }

    #[test]
    fn test_items_become_fixed_precision() {
        let record = new_order_from_extraction(
            ExtractionType::ChatLog,
            &extraction(),
            json!({}),
            json!([]),
        );
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[0].total_price(), Decimal::from(600));
        assert_eq!(record.items[1].total_price(), Decimal::from(190));
        assert_eq!(record.total_amount, Decimal::from(790));
    }

    #[test]
    fn test_missing_total_is_computed() {
        let mut extracted = extraction();
        extracted.total_amount = None;
        let record = new_order_from_extraction(
            ExtractionType::ChatLog,
            &extracted,
            json!({}),
            json!([]),
        );
        assert_eq!(record.total_amount, Decimal::from(790));
    }

    #[test]
    fn test_priceless_items_contribute_zero() {
        let extracted = ExtractedOrder {
            customer_name: None,
            items: vec![ExtractedItem {
                product_name: "Atta".into(),
                quantity: 10.0,
                unit: None,
                price: None,
            }],
            delivery_address: None,
            delivery_date: None,
            total_amount: None,
            confidence: Confidence::Score(0.4),
        };
        let record = new_order_from_extraction(
            ExtractionType::SingleMessage,
            &extracted,
            json!({}),
            json!("10 kg atta"),
        );
        assert_eq!(record.total_amount, Decimal::ZERO);
        assert_eq!(record.items[0].price_per_unit, None);
    }
}
