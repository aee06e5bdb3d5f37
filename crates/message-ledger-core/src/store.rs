// crates/message-ledger-core/src/store.rs
// ============================================================================
// Module: Message Ledger Store Interface
// Description: Message persistence interface with an in-memory reference store.
// Purpose: Define idempotent insert, filtered query, and aggregation contracts.
// Dependencies: serde, crate::{message, timestamp}
// ============================================================================

//! ## Overview
//! This module defines [`MessageStore`], the persistence seam of the ledger.
//! Uniqueness of `message_id` is the storage layer's constraint: callers
//! never pre-check existence, they insert and observe the outcome. The
//! in-memory implementation backs tests and the transient fallback mode when
//! a durable store cannot be opened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::message::IncomingMessage;
use crate::message::Message;
use crate::timestamp::UtcTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of per-sender rows reported by [`MessageStore::aggregate`].
pub const TOP_SENDERS_LIMIT: usize = 10;

// ============================================================================
// SECTION: Store Contracts
// ============================================================================

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The message was persisted for the first time.
    Inserted,
    /// The key already existed; the stored row is untouched.
    Duplicate,
}

impl InsertOutcome {
    /// Reports whether the insert hit an existing key.
    #[must_use]
    pub const fn is_duplicate(self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

/// Filter clauses for message listing; clauses compose with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Exact sender match.
    pub from: Option<String>,
    /// Inclusive lower bound on the provider-reported send time.
    pub since: Option<UtcTimestamp>,
    /// Case-insensitive substring match on the message body. Rows without a
    /// body never match.
    pub q: Option<String>,
}

/// One page of messages plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Rows in `(ts, message_id)` ascending order.
    pub rows: Vec<Message>,
    /// Total rows matching the filter, ignoring paging.
    pub total: u64,
}

/// Message count for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCount {
    /// Sender address.
    pub from: String,
    /// Number of stored messages from this sender.
    pub count: u64,
}

/// Aggregate statistics over the full ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    /// Total stored messages.
    pub total_messages: u64,
    /// Number of distinct senders.
    pub senders_count: u64,
    /// Top senders by message count, descending, at most
    /// [`TOP_SENDERS_LIMIT`] entries; ties break on sender ascending.
    pub messages_per_sender: Vec<SenderCount>,
    /// Send time of the first message in ledger order, if any.
    pub first_message_ts: Option<UtcTimestamp>,
    /// Send time of the last message in ledger order, if any.
    pub last_message_ts: Option<UtcTimestamp>,
}

/// Errors raised by message stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("message store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("message store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("message store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store configuration or data is invalid.
    #[error("message store invalid data: {0}")]
    Invalid(String),
    /// Backend reported an error.
    #[error("message store error: {0}")]
    Store(String),
}

/// Message persistence interface.
///
/// Implementations enforce `message_id` uniqueness atomically inside the
/// storage layer; callers insert and observe the outcome rather than
/// checking existence first.
pub trait MessageStore {
    /// Inserts a validated message if its key is absent.
    ///
    /// The store assigns `created_at` at insert time. A replayed key leaves
    /// the stored row untouched and reports [`InsertOutcome::Duplicate`];
    /// payload differences are never inspected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn insert(&self, message: &IncomingMessage) -> Result<InsertOutcome, StoreError>;

    /// Returns one page of messages matching `filter`.
    ///
    /// Rows are ordered by `(ts, message_id)` ascending and `total` counts
    /// every match regardless of paging. The page and the count observe one
    /// consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn query(
        &self,
        filter: &MessageFilter,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage, StoreError>;

    /// Computes aggregate statistics over the full ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn aggregate(&self) -> Result<MessageStats, StoreError>;

    /// Reports whether the store can serve a trivial read right now.
    ///
    /// Failures convert to `false`; this method never panics.
    fn health_check(&self) -> bool;
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory message store for tests and the transient fallback mode.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMessageStore {
    /// Message map keyed by message identifier, protected by a mutex.
    messages: Arc<Mutex<BTreeMap<String, Message>>>,
}

impl InMemoryMessageStore {
    /// Creates a new empty in-memory message store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl MessageStore for InMemoryMessageStore {
    fn insert(&self, message: &IncomingMessage) -> Result<InsertOutcome, StoreError> {
        let created_at = UtcTimestamp::now().map_err(|err| StoreError::Store(err.to_string()))?;
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
        if guard.contains_key(message.message_id.as_str()) {
            return Ok(InsertOutcome::Duplicate);
        }
        guard.insert(
            message.message_id.as_str().to_string(),
            Message::from_incoming(message, created_at),
        );
        drop(guard);
        Ok(InsertOutcome::Inserted)
    }

    fn query(
        &self,
        filter: &MessageFilter,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage, StoreError> {
        let mut rows: Vec<Message> = {
            let guard = self
                .messages
                .lock()
                .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
            guard.values().filter(|message| filter_matches(filter, message)).cloned().collect()
        };
        rows.sort_by(compare_ledger_order);
        let total = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        let rows: Vec<Message> = rows.into_iter().skip(skip).take(take).collect();
        Ok(MessagePage {
            rows,
            total,
        })
    }

    fn aggregate(&self) -> Result<MessageStats, StoreError> {
        let mut rows: Vec<Message> = {
            let guard = self
                .messages
                .lock()
                .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
            guard.values().cloned().collect()
        };
        rows.sort_by(compare_ledger_order);
        let total_messages = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for message in &rows {
            *counts.entry(message.from.clone()).or_insert(0) += 1;
        }
        let senders_count = u64::try_from(counts.len()).unwrap_or(u64::MAX);
        let mut messages_per_sender: Vec<SenderCount> = counts
            .into_iter()
            .map(|(from, count)| SenderCount {
                from,
                count,
            })
            .collect();
        messages_per_sender.sort_by(|a, b| match b.count.cmp(&a.count) {
            std::cmp::Ordering::Equal => a.from.cmp(&b.from),
            other => other,
        });
        messages_per_sender.truncate(TOP_SENDERS_LIMIT);
        let first_message_ts = rows.first().map(|message| message.ts.clone());
        let last_message_ts = rows.last().map(|message| message.ts.clone());
        Ok(MessageStats {
            total_messages,
            senders_count,
            messages_per_sender,
            first_message_ts,
            last_message_ts,
        })
    }

    fn health_check(&self) -> bool {
        self.messages.lock().is_ok()
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared message store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedMessageStore {
    /// Inner store implementation.
    inner: Arc<dyn MessageStore + Send + Sync>,
}

impl SharedMessageStore {
    /// Wraps a message store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl MessageStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn MessageStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl MessageStore for SharedMessageStore {
    fn insert(&self, message: &IncomingMessage) -> Result<InsertOutcome, StoreError> {
        self.inner.insert(message)
    }

    fn query(
        &self,
        filter: &MessageFilter,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage, StoreError> {
        self.inner.query(filter, limit, offset)
    }

    fn aggregate(&self) -> Result<MessageStats, StoreError> {
        self.inner.aggregate()
    }

    fn health_check(&self) -> bool {
        self.inner.health_check()
    }
}

// ============================================================================
// SECTION: Ordering and Filtering
// ============================================================================

/// Compares two messages in ledger order: `(ts, message_id)` ascending.
fn compare_ledger_order(a: &Message, b: &Message) -> std::cmp::Ordering {
    match a.ts.cmp(&b.ts) {
        std::cmp::Ordering::Equal => a.message_id.as_str().cmp(b.message_id.as_str()),
        other => other,
    }
}

/// Reports whether a message satisfies every clause of a filter.
fn filter_matches(filter: &MessageFilter, message: &Message) -> bool {
    if let Some(from) = &filter.from
        && message.from != *from
    {
        return false;
    }
    if let Some(since) = &filter.since
        && message.ts < *since
    {
        return false;
    }
    if let Some(q) = &filter.q
        && !text_contains(message.text.as_deref(), q)
    {
        return false;
    }
    true
}

/// Case-insensitive substring match over an optional message body.
fn text_contains(text: Option<&str>, needle: &str) -> bool {
    text.is_some_and(|haystack| haystack.to_lowercase().contains(&needle.to_lowercase()))
}
