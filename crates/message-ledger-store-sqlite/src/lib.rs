// crates/message-ledger-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Message Store
// Description: Durable MessageStore backend using SQLite WAL.
// Purpose: Provide production-grade persistence for Message Ledger rows.
// Dependencies: message-ledger-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`message_ledger_core::MessageStore`]
//! implementation. Uniqueness of the message key is enforced by the storage
//! engine itself via the primary-key constraint, so concurrent replays of the
//! same webhook collapse to a single row without application-level locking.
//! Reads run on a dedicated connection pool so list and stats traffic does
//! not queue behind inserts under WAL.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteMessageStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
