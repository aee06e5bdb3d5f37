// crates/message-ledger-http/src/query.rs
// ============================================================================
// Module: Message Ledger List Queries
// Description: Query-string parsing and response shaping for GET /messages.
// Purpose: Turn raw string parameters into validated window and filter values.
// Dependencies: serde, thiserror, message-ledger-core
// ============================================================================

//! ## Overview
//! The list endpoint accepts its parameters as free-form strings and fails
//! closed with stable error details. [`ListParams::from_query`] performs the
//! conversion: the paging window is bounded and defaulted, `since` must be a
//! strict UTC timestamp, and blank parameters are treated as absent.
//! [`ListResponse`] echoes the effective window alongside the page so callers
//! can resume pagination without re-deriving defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use message_ledger_core::Message;
use message_ledger_core::MessageFilter;
use message_ledger_core::MessageId;
use message_ledger_core::MessagePage;
use message_ledger_core::UtcTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size applied when the caller omits `limit`.
pub const DEFAULT_LIMIT: u64 = 50;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u64 = 100;

// ============================================================================
// SECTION: Error Types
// ============================================================================

/// Rejection raised while interpreting list-query parameters.
///
/// The display strings double as the wire-level `detail` values, so they are
/// load-bearing and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The paging window was non-numeric or out of range.
    #[error("limit must be 1-100 and offset must be >=0")]
    Window,
    /// The `since` parameter was not a strict UTC timestamp.
    #[error("invalid since")]
    Since,
}

// ============================================================================
// SECTION: Query Types
// ============================================================================

/// Raw query-string shape accepted by the list endpoint.
///
/// Every field arrives as an optional string so that malformed values reach
/// [`ListParams::from_query`] instead of being rejected by deserialization
/// with a framework-shaped error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Requested page size.
    pub limit: Option<String>,
    /// Requested page start.
    pub offset: Option<String>,
    /// Exact sender filter.
    pub from: Option<String>,
    /// Inclusive lower timestamp bound.
    pub since: Option<String>,
    /// Case-insensitive substring filter over message text.
    pub q: Option<String>,
}

/// Validated list parameters ready for store execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    /// Page size, within `1 ..= MAX_LIMIT`.
    pub limit: u64,
    /// Page start offset.
    pub offset: u64,
    /// Row filters forwarded to the store.
    pub filter: MessageFilter,
}

impl ListParams {
    /// Validates raw query parameters into an executable window and filter.
    ///
    /// Blank parameters are treated as absent: the window falls back to its
    /// defaults and blank filters apply no constraint.
    ///
    /// # Errors
    /// Returns [`QueryError::Window`] when `limit` or `offset` is non-numeric
    /// or out of range, and [`QueryError::Since`] when `since` does not parse
    /// as a strict UTC timestamp.
    pub fn from_query(query: &ListQuery) -> Result<Self, QueryError> {
        let limit = parse_bounded(query.limit.as_deref(), DEFAULT_LIMIT, 1, MAX_LIMIT)?;
        let offset = parse_bounded(query.offset.as_deref(), 0, 0, u64::MAX)?;
        let since = match query.since.as_deref().filter(|value| !value.is_empty()) {
            Some(raw) => Some(UtcTimestamp::parse(raw).map_err(|_| QueryError::Since)?),
            None => None,
        };
        let filter = MessageFilter {
            from: query.from.clone().filter(|value| !value.is_empty()),
            since,
            q: query.q.clone().filter(|value| !value.is_empty()),
        };
        Ok(Self {
            limit,
            offset,
            filter,
        })
    }
}

/// Parses a numeric window parameter with a default and an inclusive range.
fn parse_bounded(
    raw: Option<&str>,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, QueryError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    let value = trimmed.parse::<u64>().map_err(|_| QueryError::Window)?;
    if !(min ..= max).contains(&value) {
        return Err(QueryError::Window);
    }
    Ok(value)
}

// ============================================================================
// SECTION: Response Types
// ============================================================================

/// Wire form of a persisted message.
///
/// Unlike the core entity this shape always emits `text`, rendering `null`
/// for messages stored without a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageBody {
    /// Provider-assigned idempotency key.
    pub message_id: MessageId,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Provider-reported send time.
    pub ts: UtcTimestamp,
    /// Message body, `null` when absent.
    pub text: Option<String>,
    /// Ledger receipt time.
    pub created_at: UtcTimestamp,
}

impl From<Message> for MessageBody {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.message_id,
            from: message.from,
            to: message.to,
            ts: message.ts,
            text: message.text,
            created_at: message.created_at,
        }
    }
}

/// Response envelope for the list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    /// Messages in the requested window, `(ts, message_id)` ascending.
    pub data: Vec<MessageBody>,
    /// Total rows matching the filters, ignoring the window.
    pub total: u64,
    /// Effective page size after defaulting.
    pub limit: u64,
    /// Effective page offset after defaulting.
    pub offset: u64,
}

impl ListResponse {
    /// Combines a store page with the effective window that produced it.
    #[must_use]
    pub fn from_page(page: MessagePage, params: &ListParams) -> Self {
        Self {
            data: page.rows.into_iter().map(MessageBody::from).collect(),
            total: page.total,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
