//! Minimal invoice PDF rendering
//!
//! Produces a small single-page PDF straight from the invoice record so
//! the upload and signed-URL path works end to end. Layout polish is a
//! client concern; this stays a plain text rendering.

use shared::models::invoice::Invoice;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const LINE_HEIGHT: u32 = 16;

/// Escape a string for a PDF literal
fn escape(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn text_lines(invoice: &Invoice) -> Vec<String> {
    let mut lines = vec![
        invoice.business_name.clone(),
        match &invoice.gst_number {
            Some(gst) => format!("GSTIN: {gst}"),
            None => String::new(),
        },
        String::new(),
        format!("Invoice {}", invoice.invoice_number),
        format!("Date: {}", invoice.invoice_date),
        format!("Billed to: {}", invoice.customer_name),
        String::new(),
    ];

    for item in &invoice.items {
        let unit = item.unit.as_deref().unwrap_or("");
        lines.push(format!(
            "{} {} {}  x {}  =  {}",
            item.quantity, unit, item.product_name, item.price_per_unit, item.amount
        ));
    }

    lines.push(String::new());
    lines.push(format!("Subtotal: {}", invoice.subtotal));
    match invoice.igst {
        Some(igst) => lines.push(format!("IGST: {igst}")),
        None => {
            lines.push(format!("CGST: {}", invoice.cgst));
            lines.push(format!("SGST: {}", invoice.sgst));
        }
    }
    lines.push(format!("Total: {}", invoice.total));
    lines
}

/// Render an invoice into PDF bytes
pub fn render_invoice_pdf(invoice: &Invoice) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 11 Tf\n");
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in text_lines(invoice) {
        content.push_str(&format!("1 0 0 1 {MARGIN} {y} Tm ({}) Tj\n", escape(&line)));
        y = y.saturating_sub(LINE_HEIGHT);
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{content}endstream", content.len()),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", index + 1));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));

    pdf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::invoice::InvoiceLine;

    fn invoice() -> Invoice {
        Invoice {
            invoice_number: "INV-2026-042".into(),
            invoice_date: "09/03/2026".into(),
            customer_name: "Rahul (Sharma)".into(),
            items: vec![InvoiceLine {
                product_name: "Basmati Rice".into(),
                quantity: Decimal::from(2),
                unit: Some("kg".into()),
                price_per_unit: Decimal::from(150),
                amount: Decimal::from(300),
            }],
            subtotal: Decimal::from(300),
            cgst: Decimal::new(2700, 2),
            sgst: Decimal::new(2700, 2),
            igst: None,
            total: Decimal::new(35400, 2),
            business_name: "Sharma Traders".into(),
            gst_number: Some("29ABCDE1234F1Z5".into()),
        }
    }

    #[test]
    fn test_renders_wellformed_pdf() {
        let bytes = render_invoice_pdf(&invoice());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("INV-2026-042"));
        assert!(text.contains("startxref"));
    }

    #[test]
    fn test_parentheses_escaped() {
        let bytes = render_invoice_pdf(&invoice());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Rahul \\(Sharma\\)"));
    }
}
