//! PII redaction for outgoing responses
//!
//! Walks the response JSON depth-first and masks sensitive data before
//! transmission. Users holding `view_pii` bypass the interceptor; any
//! failure while resolving that permission falls closed to redaction.

pub mod patterns;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use shared::error::AppError;
use shared::models::role::Permission;

use crate::auth::{AuthContext, permissions};
use crate::state::AppState;
use patterns::{KEY_MASK, PHONE_MASK, is_sensitive_key, phone_candidates, value_patterns};

/// Regions tried when validating phone-number candidates
const PHONE_REGIONS: &[phonenumber::country::Id] = &[
    phonenumber::country::IN,
    phonenumber::country::US,
    phonenumber::country::GB,
    phonenumber::country::CA,
    phonenumber::country::AU,
    phonenumber::country::DE,
    phonenumber::country::FR,
    phonenumber::country::JP,
    phonenumber::country::SG,
];

/// True when some region's numbering plan accepts the candidate
fn is_valid_phone(candidate: &str) -> bool {
    let digits = candidate.chars().filter(char::is_ascii_digit).count();
    if digits < 7 {
        return false;
    }
    PHONE_REGIONS.iter().any(|region| {
        phonenumber::parse(Some(*region), candidate)
            .map(|num| phonenumber::is_valid(&num))
            .unwrap_or(false)
    })
}

/// Scrub one free-text string: pattern tokens first, then semantically
/// validated phone numbers.
fn scrub_string(text: &str) -> String {
    let mut current = text.to_string();
    for pattern in value_patterns() {
        if pattern.regex.is_match(&current) {
            tracing::trace!(pattern = pattern.name, "Masked value pattern in response body");
            current = pattern
                .regex
                .replace_all(&current, pattern.replacement)
                .into_owned();
        }
    }

    if phone_candidates().is_match(&current) {
        let mut out = String::with_capacity(current.len());
        let mut last = 0;
        for m in phone_candidates().find_iter(&current) {
            out.push_str(&current[last..m.start()]);
            if is_valid_phone(m.as_str().trim()) {
                out.push_str(PHONE_MASK);
            } else {
                out.push_str(m.as_str());
            }
            last = m.end();
        }
        out.push_str(&current[last..]);
        current = out;
    }

    current
}

/// Redact a JSON value without mutating the input.
///
/// Depth-first; arrays are mapped; non-string primitives and nulls pass
/// through untouched.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive_key(key) && val.is_string() {
                        (key.clone(), Value::String(KEY_MASK.to_string()))
                    } else {
                        (key.clone(), redact_value(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::String(text) => Value::String(scrub_string(text)),
        other => other.clone(),
    }
}

/// Whether the authenticated principal may see PII unmasked.
///
/// Only a bearer-authenticated user with `view_pii` qualifies; API keys
/// and anonymous requests never bypass. Errors deny.
async fn may_view_pii(state: &AppState, auth: Option<&AuthContext>) -> bool {
    let Some(auth) = auth else { return false };
    let (Some(user), Some(org_id)) = (auth.user.as_ref(), auth.org_id.as_deref()) else {
        return false;
    };
    permissions::has_permission(&state.pool, &user.id, org_id, Permission::ViewPii)
        .await
        .unwrap_or(false)
}

/// Response interceptor: rewrite outgoing JSON bodies with PII masked
pub async fn pii_redaction_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let auth = request.extensions().get::<AuthContext>().cloned();

    let response = next.run(request).await;

    if may_view_pii(&state, auth.as_ref()).await {
        return response;
    }

    let is_json = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to buffer response body for redaction: {e}");
            return AppError::internal("Response processing failed").into_response();
        }
    };

    let redacted = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            let masked = redact_value(&value);
            serde_json::to_vec(&masked).unwrap_or_else(|_| bytes.to_vec())
        }
        // Not JSON after all; pass through unchanged
        Err(_) => bytes.to_vec(),
    };

    parts.headers.remove(http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(redacted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_keys_masked() {
        let body = json!({
            "customer_name": "Rahul Sharma",
            "phone": "+91 98765 43210",
            "product_name": "Basmati Rice",
            "total_amount": 790.0
        });
        let out = redact_value(&body);
        assert_eq!(out["customer_name"], "[REDACTED]");
        assert_eq!(out["phone"], "[REDACTED]");
        assert_eq!(out["product_name"], "Basmati Rice");
        assert_eq!(out["total_amount"], 790.0);
    }

    #[test]
    fn test_value_patterns_in_free_text() {
        let body = json!({"note": "reach me at rahul@example.com, PAN ABCDE1234F"});
        let out = redact_value(&body);
        let note = out["note"].as_str().unwrap();
        assert!(note.contains("[EMAIL REDACTED]"));
        assert!(note.contains("[PAN REDACTED]"));
        assert!(!note.contains("example.com"));
    }

    #[test]
    fn test_phone_requires_semantic_validity() {
        // A valid Indian mobile number is replaced
        let valid = redact_value(&json!({"note": "call +91 98765 43210 tomorrow"}));
        assert!(valid["note"].as_str().unwrap().contains(PHONE_MASK));

        // An order quantity string of similar shape is not
        let invalid = redact_value(&json!({"note": "invoice 1234567 unpaid"}));
        assert_eq!(invalid["note"], "invoice 1234567 unpaid");
    }

    #[test]
    fn test_arrays_and_nesting() {
        let body = json!({
            "orders": [
                {"customer_name": "A", "items": [{"product_name": "Dal"}]},
                {"customer_name": "B", "delivery_address": "42 MG Road"}
            ]
        });
        let out = redact_value(&body);
        assert_eq!(out["orders"][0]["customer_name"], "[REDACTED]");
        assert_eq!(out["orders"][1]["delivery_address"], "[REDACTED]");
        assert_eq!(out["orders"][0]["items"][0]["product_name"], "Dal");
    }

    #[test]
    fn test_non_strings_untouched() {
        let body = json!({
            "phone": 9876543210i64,
            "cvv": null,
            "active": true
        });
        let out = redact_value(&body);
        // Key masking only applies to string values
        assert_eq!(out["phone"], 9876543210i64);
        assert_eq!(out["cvv"], Value::Null);
        assert_eq!(out["active"], true);
    }

    #[test]
    fn test_input_not_mutated() {
        let body = json!({"customer_name": "Rahul"});
        let _ = redact_value(&body);
        assert_eq!(body["customer_name"], "Rahul");
    }

    #[test]
    fn test_gst_and_aadhaar_tokens() {
        let out = redact_value(&json!({"note": "GSTIN 29ABCDE1234F1Z5, aadhaar 1234 5678 9012"}));
        let note = out["note"].as_str().unwrap();
        assert!(note.contains("[GST REDACTED]"));
        assert!(note.contains("[AADHAAR REDACTED]"));
    }
}
