// crates/message-ledger-core/src/timestamp.rs
// ============================================================================
// Module: Message Ledger Timestamps
// Description: Strict second-precision UTC timestamps with a stable wire form.
// Purpose: Provide ordered, validated timestamps for message send and receipt times.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! This module defines [`UtcTimestamp`], the only time representation carried
//! through the ledger. The wire form is exactly `YYYY-MM-DDTHH:MM:SSZ`. The
//! format is fixed-width, so lexicographic comparison of the wire form equals
//! chronological comparison; stores rely on this to order rows without
//! decoding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire format for second-precision UTC timestamps.
const UTC_SECOND_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Fixed wire length of a second-precision UTC timestamp.
const UTC_SECOND_LEN: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing a [`UtcTimestamp`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Value does not match the strict `YYYY-MM-DDTHH:MM:SSZ` pattern.
    #[error("timestamp must match YYYY-MM-DDTHH:MM:SSZ")]
    Pattern,
    /// Reading or formatting the wall clock failed.
    #[error("clock format error: {0}")]
    Clock(String),
}

// ============================================================================
// SECTION: Timestamp Type
// ============================================================================

/// Second-precision UTC timestamp in strict `YYYY-MM-DDTHH:MM:SSZ` form.
///
/// # Invariants
/// - The inner string always matches the strict pattern when constructed via
///   [`UtcTimestamp::parse`] or [`UtcTimestamp::now`]; deserialization trusts
///   the producer and is validated at ingestion boundaries instead.
/// - Ordering is lexicographic on the wire form, which equals chronological
///   order for this fixed-width format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcTimestamp(String);

impl UtcTimestamp {
    /// Parses a strict second-precision UTC timestamp.
    ///
    /// The check is structural: each position must hold the expected digit or
    /// separator. Calendar validity is intentionally not enforced, matching
    /// the ingestion contract, which admits any digit combination in a valid
    /// position.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Pattern`] when the value does not match.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        if is_strict_utc(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(TimestampError::Pattern)
        }
    }

    /// Captures the current UTC wall clock at whole-second precision.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Clock`] when formatting the clock fails.
    pub fn now() -> Result<Self, TimestampError> {
        let formatted = OffsetDateTime::now_utc()
            .format(&UTC_SECOND_FORMAT)
            .map_err(|err| TimestampError::Clock(err.to_string()))?;
        Ok(Self(formatted))
    }

    /// Returns the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Pattern Check
// ============================================================================

/// Reports whether a value matches the strict `YYYY-MM-DDTHH:MM:SSZ` shape.
fn is_strict_utc(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != UTC_SECOND_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(index, byte)| match index {
        4 | 7 => *byte == b'-',
        10 => *byte == b'T',
        13 | 16 => *byte == b':',
        19 => *byte == b'Z',
        _ => byte.is_ascii_digit(),
    })
}
