//! Sensitive-key set and value pattern list for the PII redactor

use regex::Regex;
use std::sync::OnceLock;

/// Replacement for values of sensitive keys
pub const KEY_MASK: &str = "[REDACTED]";

/// Field names whose string values are masked outright.
///
/// Matched on the normalized (lowercased) key, exact match only: broad
/// substring matching would eat harmless keys like `product_name`.
const SENSITIVE_KEYS: &[&str] = &[
    "customer_name",
    "customername",
    "full_name",
    "phone",
    "phone_number",
    "phonenumber",
    "mobile",
    "contact_number",
    "email",
    "email_address",
    "address",
    "delivery_address",
    "billing_address",
    "gst_number",
    "gstin",
    "aadhaar",
    "aadhaar_number",
    "aadhar",
    "pan",
    "pan_number",
    "cvv",
    "password",
    "secret",
    "token",
    "api_key",
    "access_token",
    "auth_token",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&normalized.as_str())
}

/// One value-scanning pattern with its replacement token
pub struct ValuePattern {
    pub name: &'static str,
    pub regex: Regex,
    pub replacement: &'static str,
}

/// Pattern list in application order.
///
/// Longer/more specific formats run first so a GSTIN is not half-eaten by
/// the PAN pattern and a card number is not chopped by the Aadhaar one.
pub fn value_patterns() -> &'static [ValuePattern] {
    static PATTERNS: OnceLock<Vec<ValuePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let pattern = |name, re: &str, replacement| ValuePattern {
            name,
            regex: Regex::new(re).expect("static redaction pattern must compile"),
            replacement,
        };
        vec![
            pattern(
                "email",
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
                "[EMAIL REDACTED]",
            ),
            pattern(
                "credit_card",
                r"\b\d(?:[ -]?\d){12,15}\b",
                "[CARD REDACTED]",
            ),
            pattern(
                "aadhaar",
                r"\b\d{4}[ -]?\d{4}[ -]?\d{4}\b",
                "[AADHAAR REDACTED]",
            ),
            pattern(
                "gstin",
                r"\b\d{2}[A-Z]{5}\d{4}[A-Z][0-9A-Z]Z[0-9A-Z]\b",
                "[GST REDACTED]",
            ),
            pattern("pan", r"\b[A-Z]{5}\d{4}[A-Z]\b", "[PAN REDACTED]"),
            pattern("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[SSN REDACTED]"),
            pattern(
                "uk_ni",
                r"\b[A-CEGHJ-PR-TW-Z]{2}[ ]?\d{2}[ ]?\d{2}[ ]?\d{2}[ ]?[A-D]\b",
                "[NI REDACTED]",
            ),
            pattern(
                "ipv4",
                r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
                "[IP REDACTED]",
            ),
        ]
    })
}

/// Candidate spans that might be phone numbers; validated semantically
/// before replacement.
pub fn phone_candidates() -> &'static Regex {
    static CANDIDATE: OnceLock<Regex> = OnceLock::new();
    CANDIDATE.get_or_init(|| {
        Regex::new(r"\+?[\d\s\-()]{7,20}").expect("static phone candidate pattern must compile")
    })
}

pub const PHONE_MASK: &str = "[PHONE REDACTED]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_key_matching() {
        assert!(is_sensitive_key("customer_name"));
        assert!(is_sensitive_key("Phone"));
        assert!(is_sensitive_key("GSTIN"));
        assert!(is_sensitive_key("pan"));
        assert!(!is_sensitive_key("product_name"));
        assert!(!is_sensitive_key("company"));
        assert!(!is_sensitive_key("quantity"));
    }

    #[test]
    fn test_gstin_matches_before_pan() {
        let gst = value_patterns().iter().find(|p| p.name == "gstin").unwrap();
        assert!(gst.regex.is_match("29ABCDE1234F1Z5"));
    }

    #[test]
    fn test_pan_pattern() {
        let pan = value_patterns().iter().find(|p| p.name == "pan").unwrap();
        assert!(pan.regex.is_match("ABCDE1234F"));
        assert!(!pan.regex.is_match("ABCDE12345"));
    }

    #[test]
    fn test_card_vs_aadhaar_precedence() {
        // 16-digit card: the card pattern (applied first) takes it
        let card = value_patterns()
            .iter()
            .find(|p| p.name == "credit_card")
            .unwrap();
        assert!(card.regex.is_match("4111 1111 1111 1111"));
        // 12-digit aadhaar is too short for the card pattern
        assert!(!card.regex.is_match("1234 5678 9012"));
        let aadhaar = value_patterns().iter().find(|p| p.name == "aadhaar").unwrap();
        assert!(aadhaar.regex.is_match("1234 5678 9012"));
    }
}
