//! Response extraction: pull a JSON value out of the model's reply text.
//!
//! Models often wrap their answer in a ```` ```json ```` fence even when
//! asked for raw JSON.
//!
//! 1. If a fenced block exists, parse its contents.
//! 2. Otherwise parse the whole (trimmed) text.
//! 3. Only objects and arrays count as structured output.
//!
//! Failure is a [`RoundError`]; the driver answers it with another round.

use crate::error::RoundError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// First fenced block, with or without a `json` language tag.
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n(.*?)```").unwrap());

/// Extract a structured value from a reply.
///
/// # Errors
/// * [`RoundError::NoText`] — the text is empty or whitespace
/// * [`RoundError::Malformed`] — no parseable object or array was found
pub fn extract_json(text: &str) -> Result<Value, RoundError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RoundError::NoText);
    }

    let candidate = match RE_FENCED_BLOCK.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default(),
        None => trimmed,
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Ok(v),
        Ok(other) => Err(RoundError::Malformed {
            detail: format!("expected a JSON object or array, got `{}`", preview(&other.to_string())),
        }),
        Err(e) => Err(RoundError::Malformed {
            detail: format!("{e} in `{}`", preview(candidate)),
        }),
    }
}

/// First 80 characters of `s`, for log and error messages.
fn preview(s: &str) -> String {
    const MAX: usize = 80;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_block() {
        let v = extract_json("```json\n{\"x\":1}\n```").unwrap();
        assert_eq!(v, json!({"x": 1}));
    }

    #[test]
    fn fence_without_language_tag() {
        let v = extract_json("Here you go:\n```\n[1, 2]\n```\nThanks").unwrap();
        assert_eq!(v, json!([1, 2]));
    }

    #[test]
    fn fence_with_crlf() {
        let v = extract_json("```json\r\n{\"a\": \"b\"}\r\n```").unwrap();
        assert_eq!(v, json!({"a": "b"}));
    }

    #[test]
    fn raw_json_without_fence() {
        let v = extract_json("  {\"invoiceNumber\": \"INV-7\"}\n").unwrap();
        assert_eq!(v, json!({"invoiceNumber": "INV-7"}));
    }

    #[test]
    fn truncated_json_is_malformed() {
        let err = extract_json("```json\n{\"x\": 1,\n```").unwrap_err();
        assert!(matches!(err, RoundError::Malformed { .. }));
    }

    #[test]
    fn prose_is_malformed() {
        let err = extract_json("I could not read the invoice.").unwrap_err();
        assert!(matches!(err, RoundError::Malformed { .. }));
    }

    #[test]
    fn scalar_is_not_structured() {
        let err = extract_json("42").unwrap_err();
        match err {
            RoundError::Malformed { detail } => assert!(detail.contains("42")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn whitespace_is_no_text() {
        assert_eq!(extract_json(" \n\t").unwrap_err(), RoundError::NoText);
    }

    #[test]
    fn first_of_several_fences_wins() {
        let v = extract_json("```json\n{\"a\":1}\n```\n```json\n{\"b\":2}\n```").unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 81);
        assert!(p.ends_with('\u{2026}'));
    }
}
