// crates/message-ledger-core/src/signature.rs
// ============================================================================
// Module: Message Ledger Signatures
// Description: HMAC-SHA256 webhook body signing and verification.
// Purpose: Authenticate webhook payloads with constant-time digest comparison.
// Dependencies: hex, hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! This module implements the webhook authentication scheme: the producer
//! signs the exact raw request body with HMAC-SHA256 under a shared secret
//! and sends the hex digest alongside the body. Verification recomputes the
//! digest and compares in constant time. Absence of the secret or of the
//! provided signature is an authentication failure, never a panic or an
//! error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HMAC keyed with SHA-256.
type HmacSha256 = Hmac<Sha256>;

/// Errors raised when computing a webhook signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// HMAC key material was rejected.
    #[error("signature key rejected: {0}")]
    Key(String),
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Computes the hex-encoded HMAC-SHA256 digest of `body` under `secret`.
///
/// The digest is lowercase hex over the exact bytes given; callers must sign
/// the raw request body, not a re-serialized form.
///
/// # Errors
///
/// Returns [`SignatureError::Key`] when the key cannot initialize the MAC.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| SignatureError::Key(err.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Compares two byte strings in constant time.
///
/// Unequal lengths fail without inspecting contents; equal lengths compare
/// every byte regardless of where the first difference sits.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Verifies a provided signature against the expected digest for `body`.
///
/// Returns `false` when the secret is not configured, when no signature was
/// provided, or when the digests differ. This function never panics; callers
/// decide how to report the failure.
#[must_use]
pub fn verify_signature(secret: Option<&str>, provided: Option<&str>, body: &[u8]) -> bool {
    let (Some(secret), Some(provided)) = (secret, provided) else {
        return false;
    };
    let Ok(expected) = sign(secret, body) else {
        return false;
    };
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}
