//! Invoice engine: deterministic totals with fixed-precision arithmetic
//!
//! All monetary math runs on `Decimal`; every output field is rounded
//! half-up to 2 decimal places. IEEE-754 floats never enter the
//! intermediate multiplications.

use chrono::Datelike;
use rust_decimal::prelude::*;
use shared::error::{AppError, ErrorCode};
use shared::models::invoice::{Invoice, InvoiceLine};
use shared::models::order::{Order, OrderItem};

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Invoice generation options
#[derive(Debug, Clone)]
pub struct InvoiceOptions {
    pub business_name: String,
    pub gst_number: Option<String>,
    /// Per-organization sequence number, allocated by storage. Must be >= 1.
    pub invoice_sequence: i32,
    /// Tax rate in percent; GST default is 18
    pub tax_rate_percent: Decimal,
    /// Inter-state supply uses IGST instead of the CGST/SGST split
    pub is_interstate: bool,
}

#[inline]
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an invoice number as `INV-YYYY-NNN`.
///
/// The sequence is zero-padded to width 3 and grows past three digits
/// without truncation.
pub fn invoice_number(year: i32, sequence: i32) -> String {
    format!("INV-{year}-{sequence:03}")
}

/// Format a date as `DD/MM/YYYY`
pub fn invoice_date(date: chrono::NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Compute a complete invoice record from an order.
///
/// A null line price is treated as zero; the line is still itemized so the
/// document mirrors the order.
pub fn generate_invoice(order: &Order, options: &InvoiceOptions) -> Result<Invoice, AppError> {
    if options.invoice_sequence < 1 {
        return Err(AppError::with_message(
            ErrorCode::InvalidRequest,
            "invoice sequence must be a positive integer",
        ));
    }

    let items: Vec<InvoiceLine> = order.items.iter().map(invoice_line).collect();

    let subtotal = round_money(items.iter().map(|l| l.amount).sum());

    let tax_rate = options.tax_rate_percent;
    let (cgst, sgst, igst) = if options.is_interstate {
        let igst = round_money(subtotal * tax_rate / Decimal::ONE_HUNDRED);
        (Decimal::ZERO, Decimal::ZERO, Some(igst))
    } else {
        let half = round_money(subtotal * (tax_rate / Decimal::TWO) / Decimal::ONE_HUNDRED);
        (half, half, None)
    };

    let total = round_money(subtotal + cgst + sgst + igst.unwrap_or(Decimal::ZERO));

    let today = chrono::Utc::now().date_naive();
    Ok(Invoice {
        invoice_number: invoice_number(today.year(), options.invoice_sequence),
        invoice_date: invoice_date(today),
        customer_name: order.customer_name.clone().unwrap_or_else(|| "Customer".into()),
        items,
        subtotal,
        cgst,
        sgst,
        igst,
        total,
        business_name: options.business_name.clone(),
        gst_number: options.gst_number.clone(),
    })
}

fn invoice_line(item: &OrderItem) -> InvoiceLine {
    let price = item.price_per_unit.unwrap_or(Decimal::ZERO);
    InvoiceLine {
        product_name: item.product_name.clone(),
        quantity: item.quantity,
        unit: item.unit.clone(),
        price_per_unit: price,
        amount: round_money(item.quantity * price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared::models::order::{ExtractionType, OrderStatus};
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn opts(invoice_sequence: i32) -> InvoiceOptions {
        InvoiceOptions {
            business_name: "Store".into(),
            gst_number: None,
            invoice_sequence,
            tax_rate_percent: dec("18"),
            is_interstate: false,
        }
    }

    fn item(quantity: &str, price: Option<&str>) -> OrderItem {
        let q = dec(quantity);
        let p = price.map(dec);
        OrderItem {
            id: Uuid::new_v4(),
            product_name: "Basmati Rice".into(),
            quantity: q,
            unit: Some("kg".into()),
            price_per_unit: p,
            total_price: q * p.unwrap_or(Decimal::ZERO),
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        Order {
            id: Uuid::new_v4(),
            organization_id: "org_1".into(),
            customer_id: Uuid::new_v4(),
            customer_name: Some("Rahul Sharma".into()),
            extraction_type: ExtractionType::ChatLog,
            status: OrderStatus::Pending,
            confidence: None,
            total_amount: Decimal::ZERO,
            delivery_address: None,
            delivery_date: None,
            items,
            raw_ai_response: None,
            raw_messages: None,
            invoice: None,
            invoice_sequence: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_intra_state_split() {
        // Items [2×150, 3×120], 18% intra-state, sequence 42
        let order = order(vec![item("2", Some("150")), item("3", Some("120"))]);
        let opts = InvoiceOptions {
            business_name: "Sharma Traders".into(),
            gst_number: Some("29ABCDE1234F1Z5".into()),
            invoice_sequence: 42,
            tax_rate_percent: dec("18"),
            is_interstate: false,
        };
        let inv = generate_invoice(&order, &opts).unwrap();

        assert_eq!(inv.subtotal, dec("660.00"));
        assert_eq!(inv.cgst, dec("59.40"));
        assert_eq!(inv.sgst, dec("59.40"));
        assert_eq!(inv.igst, None);
        assert_eq!(inv.total, dec("778.80"));
        assert!(inv.invoice_number.ends_with("-042"));
    }

    #[test]
    fn test_inter_state_igst() {
        let order = order(vec![item("2", Some("150")), item("3", Some("120"))]);
        let opts = InvoiceOptions {
            business_name: "Sharma Traders".into(),
            gst_number: None,
            invoice_sequence: 1,
            tax_rate_percent: dec("18"),
            is_interstate: true,
        };
        let inv = generate_invoice(&order, &opts).unwrap();

        assert_eq!(inv.cgst, Decimal::ZERO);
        assert_eq!(inv.sgst, Decimal::ZERO);
        assert_eq!(inv.igst, Some(dec("118.80")));
        assert_eq!(inv.total, dec("778.80"));
    }

    #[test]
    fn test_null_price_counts_as_zero() {
        let order = order(vec![item("5", None), item("2", Some("95"))]);
        let opts = opts(1);
        let inv = generate_invoice(&order, &opts).unwrap();

        assert_eq!(inv.items[0].amount, Decimal::ZERO);
        assert_eq!(inv.subtotal, dec("190.00"));
    }

    #[test]
    fn test_half_up_rounding_per_line() {
        // 3 × 33.335 = 100.005 → 100.01 (half-up, not banker's)
        let order = order(vec![item("3", Some("33.335"))]);
        let opts = opts(1);
        let inv = generate_invoice(&order, &opts).unwrap();
        assert_eq!(inv.items[0].amount, dec("100.01"));
    }

    #[test]
    fn test_tax_split_within_one_paise() {
        // cgst + sgst must equal round(subtotal × rate) within 0.01
        for (qty, price, rate) in [("7", "13.33", "18"), ("11", "9.99", "5"), ("3", "66.67", "12")]
        {
            let order = order(vec![item(qty, Some(price))]);
            let opts = InvoiceOptions {
                business_name: "Store".into(),
                gst_number: None,
                invoice_sequence: 1,
                tax_rate_percent: dec(rate),
                is_interstate: false,
            };
            let inv = generate_invoice(&order, &opts).unwrap();
            let combined = inv.cgst + inv.sgst;
            let reference = round_money(inv.subtotal * dec(rate) / Decimal::ONE_HUNDRED);
            let diff = (combined - reference).abs();
            assert!(diff <= dec("0.01"), "split drifted {diff} for rate {rate}");
        }
    }

    #[test]
    fn test_invoice_number_padding() {
        assert_eq!(invoice_number(2026, 42), "INV-2026-042");
        assert_eq!(invoice_number(2026, 7), "INV-2026-007");
        assert_eq!(invoice_number(2026, 1234), "INV-2026-1234");
    }

    #[test]
    fn test_invoice_date_format() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(invoice_date(d), "09/03/2026");
    }

    #[test]
    fn test_sequence_must_be_positive() {
        let order = order(vec![item("1", Some("10"))]);
        let opts = opts(0);
        assert!(generate_invoice(&order, &opts).is_err());
    }
}
