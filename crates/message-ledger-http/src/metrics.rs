// crates/message-ledger-http/src/metrics.rs
// ============================================================================
// Module: HTTP Metrics
// Description: Request counters, webhook outcomes, and latency histogram.
// Purpose: Provide text-exposition metrics without hard dependencies.
// Dependencies: std
// ============================================================================

//! ## Overview
//! In-process metrics for the ledger HTTP surface: per-path request counters,
//! per-outcome webhook counters, and a cumulative latency histogram. The
//! recorder is intentionally dependency-light so deployments can scrape the
//! text exposition or replace it with their preferred pipeline. Label values
//! come only from canonical route templates and stable outcome names, so
//! cardinality stays bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bounds in milliseconds for the request latency histogram buckets.
pub const LATENCY_BUCKET_BOUNDS_MS: &[u64] = &[100, 500];

/// Number of histogram buckets including the implicit `+Inf` bucket.
const LATENCY_BUCKET_COUNT: usize = LATENCY_BUCKET_BOUNDS_MS.len() + 1;

/// Number of webhook outcome labels.
const WEBHOOK_OUTCOME_COUNT: usize = 6;

// ============================================================================
// SECTION: Webhook Outcomes
// ============================================================================

/// Terminal classification for a webhook ingestion request.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Ingestion refused because no secret is configured.
    SecretMissing,
    /// Signature header was absent or failed verification.
    InvalidSignature,
    /// Payload failed JSON or schema validation.
    ValidationError,
    /// Message persisted for the first time.
    Created,
    /// Message key already existed; stored row untouched.
    Duplicate,
    /// Store or internal failure.
    Error,
}

impl WebhookOutcome {
    /// All outcomes in render order.
    pub const ALL: [Self; WEBHOOK_OUTCOME_COUNT] = [
        Self::SecretMissing,
        Self::InvalidSignature,
        Self::ValidationError,
        Self::Created,
        Self::Duplicate,
        Self::Error,
    ];

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecretMissing => "secret_missing",
            Self::InvalidSignature => "invalid_signature",
            Self::ValidationError => "validation_error",
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::Error => "error",
        }
    }

    /// Returns the counter slot for the outcome.
    const fn index(self) -> usize {
        match self {
            Self::SecretMissing => 0,
            Self::InvalidSignature => 1,
            Self::ValidationError => 2,
            Self::Created => 3,
            Self::Duplicate => 4,
            Self::Error => 5,
        }
    }
}

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Metrics recorder for the ledger HTTP surface.
///
/// # Invariants
/// - Counters are monotonic for the process lifetime.
/// - Latency buckets are cumulative; `+Inf` equals the observation count.
#[derive(Debug)]
pub struct HttpMetrics {
    /// Request counts keyed by canonical path template and response status.
    requests: Mutex<BTreeMap<(String, u16), u64>>,
    /// Webhook ingestion counts per terminal outcome.
    webhook_outcomes: [AtomicU64; WEBHOOK_OUTCOME_COUNT],
    /// Cumulative latency bucket counts, `+Inf` last.
    latency_buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    /// Total latency observations.
    latency_count: AtomicU64,
    /// Sum of observed latencies in microseconds.
    latency_sum_micros: AtomicU64,
}

impl HttpMetrics {
    /// Creates a recorder with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(BTreeMap::new()),
            webhook_outcomes: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_count: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
        }
    }

    /// Counts one completed request for a canonical path and status.
    pub fn record_request(&self, path: &str, status: u16) {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry((path.to_string(), status)).or_insert(0) += 1;
        }
    }

    /// Counts one terminal webhook ingestion outcome.
    pub fn record_webhook(&self, outcome: WebhookOutcome) {
        self.webhook_outcomes[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Records one latency observation into the cumulative histogram.
    pub fn observe_latency(&self, elapsed: Duration) {
        let millis = elapsed.as_millis();
        for (index, bound) in LATENCY_BUCKET_BOUNDS_MS.iter().enumerate() {
            if millis <= u128::from(*bound) {
                self.latency_buckets[index].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.latency_buckets[LATENCY_BUCKET_BOUNDS_MS.len()].fetch_add(1, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_sum_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Renders all counters in line-oriented text exposition format.
    ///
    /// Request counters render in sorted label order, webhook outcomes in
    /// declaration order including zero counts, and histogram buckets in
    /// ascending bound order with `+Inf` last.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Ok(requests) = self.requests.lock() {
            for ((path, status), count) in requests.iter() {
                let _ = writeln!(
                    out,
                    "http_requests_total{{path=\"{path}\",status=\"{status}\"}} {count}"
                );
            }
        }
        for outcome in WebhookOutcome::ALL {
            let count = self.webhook_outcomes[outcome.index()].load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "webhook_requests_total{{result=\"{}\"}} {count}",
                outcome.as_str()
            );
        }
        for (index, bound) in LATENCY_BUCKET_BOUNDS_MS.iter().enumerate() {
            let count = self.latency_buckets[index].load(Ordering::Relaxed);
            let _ = writeln!(out, "http_request_latency_ms_bucket{{le=\"{bound}\"}} {count}");
        }
        let inf = self.latency_buckets[LATENCY_BUCKET_BOUNDS_MS.len()].load(Ordering::Relaxed);
        let _ = writeln!(out, "http_request_latency_ms_bucket{{le=\"+Inf\"}} {inf}");
        let _ = writeln!(
            out,
            "http_request_latency_ms_count {}",
            self.latency_count.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "http_request_latency_ms_sum {}",
            format_millis(self.latency_sum_micros.load(Ordering::Relaxed))
        );
        out
    }
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats microseconds as fractional milliseconds with fixed precision.
fn format_millis(micros: u64) -> String {
    format!("{}.{:03}", micros / 1_000, micros % 1_000)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
