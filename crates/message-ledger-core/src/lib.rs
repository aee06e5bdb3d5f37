// crates/message-ledger-core/src/lib.rs
// ============================================================================
// Module: Message Ledger Core Library
// Description: Public API surface for the Message Ledger core.
// Purpose: Expose domain types, validation, signing, and store interfaces.
// Dependencies: crate::{message, signature, store, timestamp, validate}
// ============================================================================

//! ## Overview
//! Message Ledger core provides the domain model for an idempotent,
//! first-write-wins message archive fed by signed webhooks. It contains the
//! payload validator, the HMAC signature scheme, and the storage interface
//! with an in-memory reference implementation. It is transport-agnostic and
//! integrates through explicit interfaces rather than embedding into an HTTP
//! framework.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod message;
pub mod signature;
pub mod store;
pub mod timestamp;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use message::IncomingMessage;
pub use message::Message;
pub use message::MessageId;
pub use signature::SignatureError;
pub use signature::constant_time_eq;
pub use signature::sign;
pub use signature::verify_signature;
pub use store::InMemoryMessageStore;
pub use store::InsertOutcome;
pub use store::MessageFilter;
pub use store::MessagePage;
pub use store::MessageStats;
pub use store::MessageStore;
pub use store::SenderCount;
pub use store::SharedMessageStore;
pub use store::StoreError;
pub use store::TOP_SENDERS_LIMIT;
pub use timestamp::TimestampError;
pub use timestamp::UtcTimestamp;
pub use validate::FieldViolation;
pub use validate::MAX_TEXT_CHARS;
pub use validate::ValidationFailure;
pub use validate::validate_payload;
