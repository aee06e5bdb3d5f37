// crates/message-ledger-http/src/audit.rs
// ============================================================================
// Module: HTTP Audit Logging
// Description: Structured audit events for ledger request handling.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for ledger request
//! logging. It is intentionally lightweight so deployments can route events
//! to their preferred logging pipeline without redesign. Events never carry
//! secrets, signatures, or raw payload bodies; failure detail is limited to
//! internal error context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: String,
    /// Canonical path template for the matched route.
    pub path: &'static str,
    /// Response status code.
    pub status: u16,
    /// Terminal webhook outcome label when the request hit the write path.
    pub outcome: Option<&'static str>,
    /// Request latency in milliseconds.
    pub latency_ms: u64,
    /// Internal failure context when the request hit an error path.
    pub detail: Option<String>,
}

/// Security posture audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: String,
    /// Optional message.
    pub message: Option<String>,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditEventParams {
    /// HTTP method.
    pub method: String,
    /// Canonical path template for the matched route.
    pub path: &'static str,
    /// Response status code.
    pub status: u16,
    /// Terminal webhook outcome label when the request hit the write path.
    pub outcome: Option<&'static str>,
    /// Request latency in milliseconds.
    pub latency_ms: u64,
    /// Internal failure context when the request hit an error path.
    pub detail: Option<String>,
}

/// Inputs required to construct a security audit event.
pub struct SecurityAuditEventParams {
    /// Security event kind.
    pub kind: String,
    /// Optional message.
    pub message: Option<String>,
}

impl RequestAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "http_request",
            timestamp_ms,
            method: params.method,
            path: params.path,
            status: params.status,
            outcome: params.outcome,
            latency_ms: params.latency_ms,
            detail: params.detail,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a new security audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SecurityAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "security",
            timestamp_ms,
            kind: params.kind,
            message: params.message,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for ledger request events.
pub trait AuditSink: Send + Sync {
    /// Record a request audit event.
    fn record(&self, event: &RequestAuditEvent);

    /// Record a security posture audit event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &RequestAuditEvent) {}

    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
