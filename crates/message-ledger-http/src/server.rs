// crates/message-ledger-http/src/server.rs
// ============================================================================
// Module: Message Ledger HTTP Server
// Description: Axum server wiring routes, store, metrics, and audit together.
// Purpose: Expose webhook ingestion and read endpoints over HTTP.
// Dependencies: axum, tokio, message-ledger-config, message-ledger-core
// ============================================================================

//! ## Overview
//! The HTTP server owns the full request surface: webhook ingestion through
//! [`IngestionPipeline`], the list and stats read endpoints, metrics
//! exposition, and the liveness/readiness probes. Every handler finishes
//! through a single accounting path so each request is counted and audited
//! exactly once. Store calls shift to a blocking context when the runtime
//! supports it. Security posture: request bodies are untrusted and bounded;
//! signature verification happens before any payload parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use message_ledger_config::MessageLedgerConfig;
use message_ledger_config::StoreType;
use message_ledger_core::InMemoryMessageStore;
use message_ledger_core::MessageStore;
use message_ledger_core::SharedMessageStore;
use message_ledger_store_sqlite::SqliteMessageStore;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditSink;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::audit::StderrAuditSink;
use crate::metrics::HttpMetrics;
use crate::metrics::WebhookOutcome;
use crate::pipeline::IngestionPipeline;
use crate::pipeline::SIGNATURE_HEADER;
use crate::query::ListParams;
use crate::query::ListQuery;
use crate::query::ListResponse;
use crate::stats::StatsResponse;

// ============================================================================
// SECTION: Route Paths
// ============================================================================

/// Webhook ingestion route.
const WEBHOOK_PATH: &str = "/webhook";

/// Message listing route.
const MESSAGES_PATH: &str = "/messages";

/// Ledger statistics route.
const STATS_PATH: &str = "/stats";

/// Metrics exposition route.
const METRICS_PATH: &str = "/metrics";

/// Liveness probe route.
const HEALTH_PATH: &str = "/healthz";

/// Readiness probe route.
const READY_PATH: &str = "/readyz";

/// Metrics label for requests that match no route.
const UNMATCHED_LABEL: &str = "unmatched";

/// Content type for the metrics exposition format.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

// ============================================================================
// SECTION: HTTP Server
// ============================================================================

/// Message ledger HTTP server instance.
pub struct HttpServer {
    /// Validated service configuration.
    config: MessageLedgerConfig,
    /// Shared request-handling state.
    state: Arc<ServerState>,
}

impl HttpServer {
    /// Builds a new HTTP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid.
    pub fn from_config(config: MessageLedgerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit: Arc<dyn AuditSink> = Arc::new(StderrAuditSink);
        let state = build_server_state(&config, audit);
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the persistence mode selected while building the server.
    #[must_use]
    pub fn store_mode(&self) -> StoreMode {
        self.state.readiness.store_mode()
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let app = build_router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds shared handler state from validated configuration.
fn build_server_state(config: &MessageLedgerConfig, audit: Arc<dyn AuditSink>) -> Arc<ServerState> {
    let (store, store_mode) = build_message_store(config, audit.as_ref());
    let secret = config.webhook.secret.clone();
    if secret.is_none() {
        audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind: "webhook_secret_missing".to_string(),
            message: Some(
                "webhook requests will be rejected until a secret is configured".to_string(),
            ),
        }));
    }
    let readiness = ReadinessState::new(store.clone(), secret.is_some(), store_mode);
    Arc::new(ServerState {
        pipeline: IngestionPipeline::new(secret, store.clone()),
        store,
        metrics: Arc::new(HttpMetrics::new()),
        audit,
        max_body_bytes: config.server.max_body_bytes,
        readiness,
    })
}

/// Builds the message store from configuration.
///
/// A sqlite store that fails to open degrades to the in-memory store so the
/// service keeps serving; the degradation is recorded as a security event and
/// surfaced through the readiness payload as `memory-fallback`.
fn build_message_store(
    config: &MessageLedgerConfig,
    audit: &dyn AuditSink,
) -> (SharedMessageStore, StoreMode) {
    match config.store.store_type {
        StoreType::Memory => {
            (SharedMessageStore::from_store(InMemoryMessageStore::new()), StoreMode::Memory)
        }
        StoreType::Sqlite => match SqliteMessageStore::new(&config.store.sqlite_config()) {
            Ok(store) => (SharedMessageStore::from_store(store), StoreMode::Sqlite),
            Err(err) => {
                audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
                    kind: "store_fallback".to_string(),
                    message: Some(err.to_string()),
                }));
                (
                    SharedMessageStore::from_store(InMemoryMessageStore::new()),
                    StoreMode::MemoryFallback,
                )
            }
        },
    }
}

/// Builds the service router over shared state.
///
/// Body extraction allows one byte past the configured cap; the webhook
/// handler owns the documented 413 response for bodies over the cap. Each
/// route carries a method fallback so wrong-method requests are accounted
/// like any other completed request.
fn build_router(state: Arc<ServerState>) -> Router {
    let body_ceiling = state.max_body_bytes.saturating_add(1);
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook).fallback(handle_method_not_allowed))
        .route(MESSAGES_PATH, get(handle_messages).fallback(handle_method_not_allowed))
        .route(STATS_PATH, get(handle_stats).fallback(handle_method_not_allowed))
        .route(METRICS_PATH, get(handle_metrics).fallback(handle_method_not_allowed))
        .route(HEALTH_PATH, get(handle_health).fallback(handle_method_not_allowed))
        .route(READY_PATH, get(handle_ready).fallback(handle_method_not_allowed))
        .fallback(handle_unmatched)
        .layer(DefaultBodyLimit::max(body_ceiling))
        .with_state(state)
}

/// Shared state for request handlers.
#[derive(Clone)]
struct ServerState {
    /// Webhook verification and persistence pipeline.
    pipeline: IngestionPipeline,
    /// Shared message store for the read endpoints.
    store: SharedMessageStore,
    /// Request metrics recorder.
    metrics: Arc<HttpMetrics>,
    /// Audit sink for request and security events.
    audit: Arc<dyn AuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// Readiness probe state.
    readiness: ReadinessState,
}

// ============================================================================
// SECTION: Store Mode and Readiness
// ============================================================================

/// Persistence mode the server is running with.
///
/// # Invariants
/// - Labels are stable; the readiness payload exposes them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Durable sqlite store from configuration.
    Sqlite,
    /// In-memory store selected by configuration.
    Memory,
    /// In-memory store adopted after a sqlite open failure.
    MemoryFallback,
}

impl StoreMode {
    /// Returns the stable readiness label for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
            Self::MemoryFallback => "memory-fallback",
        }
    }
}

/// Inputs for the readiness probe.
#[derive(Clone)]
pub struct ReadinessState {
    /// Store handle probed for health.
    store: SharedMessageStore,
    /// Whether a webhook secret is configured.
    secret_configured: bool,
    /// Persistence mode reported to callers.
    store_mode: StoreMode,
}

impl ReadinessState {
    /// Creates readiness state over a store handle.
    #[must_use]
    pub const fn new(
        store: SharedMessageStore,
        secret_configured: bool,
        store_mode: StoreMode,
    ) -> Self {
        Self {
            store,
            secret_configured,
            store_mode,
        }
    }

    /// Probes every readiness sub-condition.
    #[must_use]
    pub fn check(&self) -> ReadinessStatus {
        ReadinessStatus {
            store: self.store.health_check(),
            secret: self.secret_configured,
        }
    }

    /// Returns the persistence mode reported by the probe.
    #[must_use]
    pub const fn store_mode(&self) -> StoreMode {
        self.store_mode
    }
}

/// Result of one readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessStatus {
    /// Store health check outcome.
    pub store: bool,
    /// Webhook secret presence.
    pub secret: bool,
}

impl ReadinessStatus {
    /// Reports whether every sub-condition holds.
    #[must_use]
    pub const fn ready(self) -> bool {
        self.store && self.secret
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles webhook ingestion requests.
async fn handle_webhook(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let started = Instant::now();
    if bytes.len() > state.max_body_bytes {
        return finalize(&state, ReplyParams {
            started,
            method: Method::POST,
            path: WEBHOOK_PATH,
            status: StatusCode::PAYLOAD_TOO_LARGE,
            outcome: None,
            body: json!({"detail": "request body too large"}),
            detail: None,
        });
    }
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let result = run_store_op(|| state.pipeline.ingest(signature, &bytes));
    state.metrics.record_webhook(result.outcome);
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    finalize(&state, ReplyParams {
        started,
        method: Method::POST,
        path: WEBHOOK_PATH,
        status,
        outcome: Some(result.outcome),
        body: result.body,
        detail: result.error_detail,
    })
}

/// Handles message listing requests.
async fn handle_messages(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let started = Instant::now();
    let params = match ListParams::from_query(&query) {
        Ok(params) => params,
        Err(err) => {
            return finalize(&state, ReplyParams {
                started,
                method: Method::GET,
                path: MESSAGES_PATH,
                status: StatusCode::UNPROCESSABLE_ENTITY,
                outcome: None,
                body: json!({"detail": err.to_string()}),
                detail: None,
            });
        }
    };
    let page = run_store_op(|| state.store.query(&params.filter, params.limit, params.offset));
    let (status, body, detail) = match page {
        Ok(page) => match serde_json::to_value(ListResponse::from_page(page, &params)) {
            Ok(body) => (StatusCode::OK, body, None),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"detail": "internal server error"}),
                Some(err.to_string()),
            ),
        },
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "internal server error"}),
            Some(err.to_string()),
        ),
    };
    finalize(&state, ReplyParams {
        started,
        method: Method::GET,
        path: MESSAGES_PATH,
        status,
        outcome: None,
        body,
        detail,
    })
}

/// Handles ledger statistics requests.
async fn handle_stats(State(state): State<Arc<ServerState>>) -> Response {
    let started = Instant::now();
    let stats = run_store_op(|| state.store.aggregate());
    let (status, body, detail) = match stats {
        Ok(stats) => match serde_json::to_value(StatsResponse::from(stats)) {
            Ok(body) => (StatusCode::OK, body, None),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"detail": "internal server error"}),
                Some(err.to_string()),
            ),
        },
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "internal server error"}),
            Some(err.to_string()),
        ),
    };
    finalize(&state, ReplyParams {
        started,
        method: Method::GET,
        path: STATS_PATH,
        status,
        outcome: None,
        body,
        detail,
    })
}

/// Handles metrics exposition requests.
///
/// The rendered body reflects state before this request; its own accounting
/// lands after rendering, so a scrape never counts itself.
async fn handle_metrics(State(state): State<Arc<ServerState>>) -> Response {
    let started = Instant::now();
    let body = state.metrics.render();
    let elapsed = started.elapsed();
    state.metrics.record_request(METRICS_PATH, StatusCode::OK.as_u16());
    state.metrics.observe_latency(elapsed);
    state.audit.record(&RequestAuditEvent::new(RequestAuditEventParams {
        method: Method::GET.to_string(),
        path: METRICS_PATH,
        status: StatusCode::OK.as_u16(),
        outcome: None,
        latency_ms: elapsed_millis(elapsed),
        detail: None,
    }));
    (StatusCode::OK, [(CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response()
}

/// Handles liveness probe requests.
async fn handle_health(State(state): State<Arc<ServerState>>) -> Response {
    let started = Instant::now();
    finalize(&state, ReplyParams {
        started,
        method: Method::GET,
        path: HEALTH_PATH,
        status: StatusCode::OK,
        outcome: None,
        body: json!({"status": "ok"}),
        detail: None,
    })
}

/// Handles readiness probe requests.
async fn handle_ready(State(state): State<Arc<ServerState>>) -> Response {
    let started = Instant::now();
    let probe = run_store_op(|| state.readiness.check());
    let status = if probe.ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = json!({
        "status": if probe.ready() { "ready" } else { "not_ready" },
        "checks": {
            "store": probe.store,
            "secret": probe.secret,
        },
        "store_mode": state.readiness.store_mode().as_str(),
    });
    finalize(&state, ReplyParams {
        started,
        method: Method::GET,
        path: READY_PATH,
        status,
        outcome: None,
        body,
        detail: None,
    })
}

/// Handles requests that match no configured route.
async fn handle_unmatched(State(state): State<Arc<ServerState>>, method: Method) -> Response {
    let started = Instant::now();
    finalize(&state, ReplyParams {
        started,
        method,
        path: UNMATCHED_LABEL,
        status: StatusCode::NOT_FOUND,
        outcome: None,
        body: json!({"detail": "not found"}),
        detail: None,
    })
}

/// Handles requests whose path matched a route but whose method did not.
async fn handle_method_not_allowed(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let started = Instant::now();
    finalize(&state, ReplyParams {
        started,
        method,
        path: canonical_path(uri.path()),
        status: StatusCode::METHOD_NOT_ALLOWED,
        outcome: None,
        body: json!({"detail": "method not allowed"}),
        detail: None,
    })
}

/// Maps a request path back to its static route label.
fn canonical_path(path: &str) -> &'static str {
    match path {
        WEBHOOK_PATH => WEBHOOK_PATH,
        MESSAGES_PATH => MESSAGES_PATH,
        STATS_PATH => STATS_PATH,
        METRICS_PATH => METRICS_PATH,
        HEALTH_PATH => HEALTH_PATH,
        READY_PATH => READY_PATH,
        _ => UNMATCHED_LABEL,
    }
}

// ============================================================================
// SECTION: Response Plumbing
// ============================================================================

/// Inputs for finalizing a request response.
struct ReplyParams {
    /// Request start time.
    started: Instant,
    /// Request method.
    method: Method,
    /// Stable path label for metrics and audit.
    path: &'static str,
    /// Response status.
    status: StatusCode,
    /// Terminal webhook outcome when the write path ran.
    outcome: Option<WebhookOutcome>,
    /// JSON response body.
    body: Value,
    /// Internal failure context for the audit trail.
    detail: Option<String>,
}

/// Finalizes a JSON response, recording metrics and audit exactly once.
fn finalize(state: &ServerState, params: ReplyParams) -> Response {
    let elapsed = params.started.elapsed();
    state.metrics.record_request(params.path, params.status.as_u16());
    state.metrics.observe_latency(elapsed);
    state.audit.record(&RequestAuditEvent::new(RequestAuditEventParams {
        method: params.method.to_string(),
        path: params.path,
        status: params.status.as_u16(),
        outcome: params.outcome.map(WebhookOutcome::as_str),
        latency_ms: elapsed_millis(elapsed),
        detail: params.detail,
    }));
    (params.status, Json(params.body)).into_response()
}

/// Saturating conversion from a duration to whole milliseconds.
fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Runs a blocking store operation, shifting off the async worker when the
/// runtime supports it.
fn run_store_op<T>(operation: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(operation)
        }
        _ => operation(),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
