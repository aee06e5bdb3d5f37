// crates/message-ledger-core/src/message.rs
// ============================================================================
// Module: Message Ledger Messages
// Description: Canonical message entities and identifiers.
// Purpose: Provide strongly typed, serializable message records with stable wire forms.
// Dependencies: serde, crate::timestamp
// ============================================================================

//! ## Overview
//! This module defines the message entities carried through the ledger. A
//! [`MessageId`] is the opaque idempotency key supplied by the upstream
//! provider. An [`IncomingMessage`] is a validated payload that has not been
//! persisted yet; a [`Message`] is the persisted record including the
//! ledger-assigned receipt time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::timestamp::UtcTimestamp;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Provider-assigned message identifier used for idempotency.
///
/// # Invariants
/// - Opaque non-empty UTF-8 string; emptiness is rejected at validation
///   boundaries, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new message identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Message Entities
// ============================================================================

/// Validated message payload awaiting persistence.
///
/// # Invariants
/// - `from` and `to` are `+`-prefixed digit strings.
/// - `ts` is a strict UTC second-precision timestamp.
/// - `text`, when present, is at most the configured character limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Provider-assigned idempotency key.
    pub message_id: MessageId,
    /// Sender address in `+<digits>` form.
    pub from: String,
    /// Recipient address in `+<digits>` form.
    pub to: String,
    /// Provider-reported send time.
    pub ts: UtcTimestamp,
    /// Optional message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Persisted message record.
///
/// # Invariants
/// - `created_at` is assigned exactly once, by the store that first accepted
///   the message; replays never update it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-assigned idempotency key.
    pub message_id: MessageId,
    /// Sender address in `+<digits>` form.
    pub from: String,
    /// Recipient address in `+<digits>` form.
    pub to: String,
    /// Provider-reported send time.
    pub ts: UtcTimestamp,
    /// Optional message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ledger receipt time assigned at first insert.
    pub created_at: UtcTimestamp,
}

impl Message {
    /// Builds a persisted record from a validated payload and a receipt time.
    #[must_use]
    pub fn from_incoming(incoming: &IncomingMessage, created_at: UtcTimestamp) -> Self {
        Self {
            message_id: incoming.message_id.clone(),
            from: incoming.from.clone(),
            to: incoming.to.clone(),
            ts: incoming.ts.clone(),
            text: incoming.text.clone(),
            created_at,
        }
    }
}
