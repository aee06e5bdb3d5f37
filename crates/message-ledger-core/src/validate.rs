// crates/message-ledger-core/src/validate.rs
// ============================================================================
// Module: Message Ledger Payload Validation
// Description: Structural validation of inbound webhook payloads.
// Purpose: Convert raw request bytes into validated messages or field-level violations.
// Dependencies: serde_json, crate::{message, timestamp}
// ============================================================================

//! ## Overview
//! This module validates raw webhook bodies against the message schema. The
//! validator is a pure function over bytes: it performs no I/O and collects
//! every field violation in one pass so callers can report the complete set
//! to the producer instead of the first failure only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::message::IncomingMessage;
use crate::message::MessageId;
use crate::timestamp::UtcTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum allowed `text` length, measured in characters.
pub const MAX_TEXT_CHARS: usize = 4096;

// ============================================================================
// SECTION: Validation Results
// ============================================================================

/// One structural violation on a named payload field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldViolation {
    /// Payload field that failed.
    pub field: String,
    /// Human-readable reason suitable for the wire.
    pub reason: String,
}

impl FieldViolation {
    /// Creates a violation for a named field.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a failed payload validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Body bytes were not parseable JSON.
    #[error("invalid JSON body")]
    InvalidJson,
    /// Body parsed but one or more fields failed structural checks.
    #[error("payload failed validation: {} violation(s)", .0.len())]
    Schema(Vec<FieldViolation>),
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validates raw webhook body bytes into an [`IncomingMessage`].
///
/// All field violations are collected before returning, so a payload with an
/// empty `message_id` and a malformed `ts` reports both. Unknown fields are
/// ignored. JSON `null` counts as absent for every field.
///
/// # Errors
///
/// Returns [`ValidationFailure::InvalidJson`] when the bytes do not parse,
/// or [`ValidationFailure::Schema`] listing every violated field.
pub fn validate_payload(raw: &[u8]) -> Result<IncomingMessage, ValidationFailure> {
    let value: Value = serde_json::from_slice(raw).map_err(|_| ValidationFailure::InvalidJson)?;
    let Value::Object(fields) = value else {
        return Err(ValidationFailure::Schema(vec![FieldViolation::new(
            "body",
            "must be a JSON object",
        )]));
    };
    let mut violations = Vec::new();

    let message_id = string_field(&fields, "message_id", &mut violations).and_then(|value| {
        if value.is_empty() {
            violations.push(FieldViolation::new("message_id", "must be a non-empty string"));
            None
        } else {
            Some(MessageId::new(value))
        }
    });
    let from = phone_field(&fields, "from", &mut violations);
    let to = phone_field(&fields, "to", &mut violations);
    let ts = string_field(&fields, "ts", &mut violations).and_then(|value| {
        UtcTimestamp::parse(value).map_or_else(
            |_| {
                violations.push(FieldViolation::new("ts", "must match YYYY-MM-DDTHH:MM:SSZ"));
                None
            },
            Some,
        )
    });
    let text = text_field(&fields, &mut violations);

    match (message_id, from, to, ts) {
        (Some(message_id), Some(from), Some(to), Some(ts)) if violations.is_empty() => {
            Ok(IncomingMessage {
                message_id,
                from,
                to,
                ts,
                text,
            })
        }
        _ => Err(ValidationFailure::Schema(violations)),
    }
}

// ============================================================================
// SECTION: Field Checks
// ============================================================================

/// Extracts a required string field, recording a violation when absent or
/// mistyped.
fn string_field<'a>(
    fields: &'a Map<String, Value>,
    name: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<&'a str> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::new(name, "is required"));
            None
        }
        Some(Value::String(value)) => Some(value),
        Some(_) => {
            violations.push(FieldViolation::new(name, "must be a string"));
            None
        }
    }
}

/// Extracts a required phone-number field in `+<digits>` form.
fn phone_field(
    fields: &Map<String, Value>,
    name: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    string_field(fields, name, violations).and_then(|value| {
        if is_phone(value) {
            Some(value.to_string())
        } else {
            violations.push(FieldViolation::new(name, "must be '+' followed by digits"));
            None
        }
    })
}

/// Extracts the optional `text` field, enforcing the character limit.
fn text_field(fields: &Map<String, Value>, violations: &mut Vec<FieldViolation>) -> Option<String> {
    match fields.get("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => {
            if value.chars().count() > MAX_TEXT_CHARS {
                violations.push(FieldViolation::new(
                    "text",
                    format!("must be at most {MAX_TEXT_CHARS} characters"),
                ));
                None
            } else {
                Some(value.clone())
            }
        }
        Some(_) => {
            violations.push(FieldViolation::new("text", "must be a string"));
            None
        }
    }
}

/// Reports whether a value is a `+`-prefixed non-empty digit string.
fn is_phone(value: &str) -> bool {
    value.strip_prefix('+').is_some_and(|digits| {
        !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
    })
}
