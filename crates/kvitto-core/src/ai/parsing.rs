//! JSON parsing helpers for AI backend responses
//!
//! These functions extract JSON from AI model responses, which often include
//! extra text (or markdown fences) before/after the JSON payload.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::types::{CategoryChoice, ReceiptFields};

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Find the outermost JSON object in a response and deserialize it
fn parse_json_object<T: DeserializeOwned>(response: &str, what: &str) -> Result<T> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid {} JSON from AI: {} | Raw: {}",
                    what,
                    e,
                    truncate(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI {} response | Raw: {}",
            what,
            truncate(response)
        ))),
    }
}

/// Parse extracted receipt fields from a vision model response
pub fn parse_receipt_fields(response: &str) -> Result<ReceiptFields> {
    parse_json_object(response, "receipt")
}

/// Parse a revised draft from a revision response
pub fn parse_revision(response: &str) -> Result<ReceiptFields> {
    parse_json_object(response, "revision")
}

/// Parse a category choice
///
/// Small models sometimes answer with the bare category name instead of
/// JSON; that is accepted as long as it is a single non-empty line.
pub fn parse_category_choice(response: &str) -> Result<CategoryChoice> {
    match parse_json_object::<CategoryChoice>(response, "classification") {
        Ok(choice) => Ok(choice),
        Err(e) => {
            let bare = response.trim().trim_matches('"').trim();
            if !bare.is_empty() && !bare.contains('\n') && !bare.contains('{') {
                Ok(CategoryChoice {
                    category: bare.to_string(),
                })
            } else {
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt_with_surrounding_text() {
        let response = "Sure! Here it is:\n```json\n{\"date\": \"2024-03-01\", \"amount\": 42.50, \"payment_method\": \"Visa\"}\n```";
        let fields = parse_receipt_fields(response).unwrap();
        assert_eq!(fields.date.as_deref(), Some("2024-03-01"));
        assert_eq!(fields.amount.as_deref(), Some("42.5"));
        assert_eq!(fields.payment_method.as_deref(), Some("Visa"));
    }

    #[test]
    fn test_parse_receipt_without_json() {
        let err = parse_receipt_fields("I cannot read this image").unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_parse_category_choice() {
        let choice = parse_category_choice(r#"{"category": "Office Supplies"}"#).unwrap();
        assert_eq!(choice.category, "Office Supplies");

        let bare = parse_category_choice("\"Travel\"\n").unwrap();
        assert_eq!(bare.category, "Travel");

        assert!(parse_category_choice("").is_err());
        assert!(parse_category_choice("line one\nline two").is_err());
    }
}
