// crates/message-ledger-http/src/lib.rs
// ============================================================================
// Module: Message Ledger HTTP Library
// Description: HTTP surface for webhook ingestion, queries, and probes.
// Purpose: Expose the message ledger over axum with full request accounting.
// Dependencies: message-ledger-core, message-ledger-config, axum, tokio
// ============================================================================

//! ## Overview
//! `message-ledger-http` assembles the ledger service: the signed-webhook
//! ingestion pipeline, the list and stats read endpoints, the metrics
//! exposition endpoint, and the liveness/readiness probes. Security posture:
//! request bodies, signatures, and query strings are untrusted input; every
//! request terminates in exactly one recorded outcome.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod stats;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::RequestAuditEventParams;
pub use audit::SecurityAuditEvent;
pub use audit::SecurityAuditEventParams;
pub use audit::StderrAuditSink;
pub use metrics::HttpMetrics;
pub use metrics::LATENCY_BUCKET_BOUNDS_MS;
pub use metrics::WebhookOutcome;
pub use pipeline::IngestionPipeline;
pub use pipeline::IngestionResult;
pub use pipeline::SIGNATURE_HEADER;
pub use query::DEFAULT_LIMIT;
pub use query::ListParams;
pub use query::ListQuery;
pub use query::ListResponse;
pub use query::MAX_LIMIT;
pub use query::MessageBody;
pub use query::QueryError;
pub use server::HttpServer;
pub use server::ReadinessState;
pub use server::ReadinessStatus;
pub use server::ServerError;
pub use server::StoreMode;
pub use stats::StatsResponse;
