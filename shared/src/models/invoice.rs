//! Invoice record: immutable snapshot embedded in an order once attached

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One invoice line with its rounded amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_name: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub price_per_unit: Decimal,
    /// quantity × price, rounded half-up to 2 decimals
    pub amount: Decimal,
}

/// Tax-compliant invoice snapshot
///
/// Attached to an order inside the same transaction that allocates its
/// sequence number; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// `INV-YYYY-NNN`
    pub invoice_number: String,
    /// `DD/MM/YYYY`
    pub invoice_date: String,
    pub customer_name: String,
    pub items: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    /// Present only for inter-state supply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub igst: Option<Decimal>,
    pub total: Decimal,
    pub business_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
}
