// crates/message-ledger-config/src/lib.rs
// ============================================================================
// Module: Message Ledger Config Library
// Description: Canonical config model and validation for the ledger service.
// Purpose: Single source of truth for message-ledger.toml semantics.
// Dependencies: message-ledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `message-ledger-config` defines the configuration model for the message
//! ledger service. Parsing is strict and validation fails closed: a present
//! but malformed config file stops startup instead of silently degrading.
//! The only tolerated absence is the implicit default config file, so the
//! service can boot with zero configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
