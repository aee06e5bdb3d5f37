// crates/message-ledger-http/src/pipeline.rs
// ============================================================================
// Module: Ingestion Pipeline
// Description: Ordered verification pipeline for signed webhook payloads.
// Purpose: Map every webhook request to exactly one terminal outcome.
// Dependencies: message-ledger-core, serde_json
// ============================================================================

//! ## Overview
//! The ingestion pipeline runs the fixed verification order for webhook
//! requests: secret presence, signature verification, payload validation,
//! then idempotent persistence. Each stage either passes the request on or
//! terminates it with a status, outcome label, and response body. The
//! pipeline is transport-free; the server layer owns status conversion,
//! metrics, and audit.
//!
//! Security posture: signature verification runs before the body is parsed,
//! so unauthenticated senders learn nothing about payload handling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use message_ledger_core::MessageStore;
use message_ledger_core::SharedMessageStore;
use message_ledger_core::ValidationFailure;
use message_ledger_core::validate_payload;
use message_ledger_core::verify_signature;
use serde_json::Value;
use serde_json::json;

use crate::metrics::WebhookOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the hex HMAC digest of the raw request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Terminal result of running one webhook request through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestionResult {
    /// HTTP status code for the response.
    pub status: u16,
    /// Terminal outcome classification.
    pub outcome: WebhookOutcome,
    /// JSON response body.
    pub body: Value,
    /// Internal failure context for audit; never sent on the wire.
    pub error_detail: Option<String>,
}

/// Webhook ingestion pipeline over an injected secret and store.
///
/// # Invariants
/// - Stages run in fixed order; the first failing stage terminates the
///   request.
/// - A duplicate `message_id` is a success; the stored row is untouched and
///   the duplicate payload is never inspected beyond validation.
#[derive(Clone)]
pub struct IngestionPipeline {
    /// Shared secret for signature verification; `None` disables ingestion.
    secret: Option<String>,
    /// Message store receiving validated payloads.
    store: SharedMessageStore,
}

impl IngestionPipeline {
    /// Creates a pipeline over the given secret and store.
    #[must_use]
    pub const fn new(secret: Option<String>, store: SharedMessageStore) -> Self {
        Self {
            secret,
            store,
        }
    }

    /// Runs one webhook request through the pipeline.
    ///
    /// `signature` is the raw `X-Signature` header value when present, and
    /// `body` is the raw request body the digest was computed over.
    #[must_use]
    pub fn ingest(&self, signature: Option<&str>, body: &[u8]) -> IngestionResult {
        let Some(secret) = self.secret.as_deref() else {
            return IngestionResult {
                status: 503,
                outcome: WebhookOutcome::SecretMissing,
                body: json!({"detail": "webhook secret not configured"}),
                error_detail: None,
            };
        };
        if !verify_signature(Some(secret), signature, body) {
            return IngestionResult {
                status: 401,
                outcome: WebhookOutcome::InvalidSignature,
                body: json!({"detail": "invalid signature"}),
                error_detail: None,
            };
        }
        let incoming = match validate_payload(body) {
            Ok(incoming) => incoming,
            Err(failure) => {
                return IngestionResult {
                    status: 422,
                    outcome: WebhookOutcome::ValidationError,
                    body: validation_body(&failure),
                    error_detail: None,
                };
            }
        };
        match self.store.insert(&incoming) {
            Ok(outcome) if outcome.is_duplicate() => IngestionResult {
                status: 200,
                outcome: WebhookOutcome::Duplicate,
                body: json!({"status": "ok"}),
                error_detail: None,
            },
            Ok(_) => IngestionResult {
                status: 200,
                outcome: WebhookOutcome::Created,
                body: json!({"status": "ok"}),
                error_detail: None,
            },
            Err(err) => IngestionResult {
                status: 500,
                outcome: WebhookOutcome::Error,
                body: json!({"detail": "internal server error"}),
                error_detail: Some(err.to_string()),
            },
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the 422 response body for a validation failure.
fn validation_body(failure: &ValidationFailure) -> Value {
    match failure {
        ValidationFailure::InvalidJson => json!({"detail": "invalid JSON body"}),
        ValidationFailure::Schema(violations) => json!({"detail": violations}),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
