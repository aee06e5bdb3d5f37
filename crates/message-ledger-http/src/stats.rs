// crates/message-ledger-http/src/stats.rs
// ============================================================================
// Module: Message Ledger Stats Responses
// Description: Wire shape for the GET /stats endpoint.
// Purpose: Project store aggregates into a stable response envelope.
// Dependencies: serde, message-ledger-core
// ============================================================================

//! ## Overview
//! A thin projection of [`MessageStats`] owned by the HTTP layer so the wire
//! contract stays stable even if the store aggregate grows new fields. The
//! first/last timestamps serialize as `null` on an empty ledger.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use message_ledger_core::MessageStats;
use message_ledger_core::SenderCount;
use message_ledger_core::UtcTimestamp;

// ============================================================================
// SECTION: Response Types
// ============================================================================

/// Response envelope for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsResponse {
    /// Total stored messages.
    pub total_messages: u64,
    /// Number of distinct senders.
    pub senders_count: u64,
    /// Top senders by message count, descending.
    pub messages_per_sender: Vec<SenderCount>,
    /// Send time of the earliest message, `null` when the ledger is empty.
    pub first_message_ts: Option<UtcTimestamp>,
    /// Send time of the latest message, `null` when the ledger is empty.
    pub last_message_ts: Option<UtcTimestamp>,
}

impl From<MessageStats> for StatsResponse {
    fn from(stats: MessageStats) -> Self {
        Self {
            total_messages: stats.total_messages,
            senders_count: stats.senders_count,
            messages_per_sender: stats.messages_per_sender,
            first_message_ts: stats.first_message_ts,
            last_message_ts: stats.last_message_ts,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
