// crates/message-ledger-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Message Store
// Description: Durable MessageStore backed by SQLite WAL.
// Purpose: Persist messages idempotently and serve filtered reads and stats.
// Dependencies: message-ledger-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`MessageStore`] using `SQLite`. Inserts
//! go through a single guarded writer connection and rely on the primary-key
//! constraint for first-write-wins semantics: a conflicting key changes zero
//! rows and reports a duplicate. Reads run on a round-robin pool of separate
//! connections, each query inside one transaction so the page and its total
//! observe the same snapshot. Database contents are treated as untrusted on
//! the way out; malformed stored timestamps fail closed as corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use message_ledger_core::IncomingMessage;
use message_ledger_core::InsertOutcome;
use message_ledger_core::Message;
use message_ledger_core::MessageFilter;
use message_ledger_core::MessageId;
use message_ledger_core::MessagePage;
use message_ledger_core::MessageStats;
use message_ledger_core::MessageStore;
use message_ledger_core::SenderCount;
use message_ledger_core::StoreError;
use message_ledger_core::TOP_SENDERS_LIMIT;
use message_ledger_core::UtcTimestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::ToSql;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 2;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` message store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Builds a config with defaults for everything except the path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding message bodies or sender addresses.
#[derive(Debug, Clone, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption detected on read.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed message store with WAL support.
#[derive(Clone)]
pub struct SqliteMessageStore {
    /// Writer connection guarded by a mutex; all inserts serialize here.
    write_connection: Arc<Mutex<Connection>>,
    /// Read connection pool for query isolation.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor over the read pool.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteMessageStore {
    /// Opens an `SQLite`-backed message store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            let mut read_connection = open_connection(config)?;
            initialize_schema(&mut read_connection)?;
            read_connections.push(Mutex::new(read_connection));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Inserts a message through the writer connection.
    fn insert_message(&self, message: &IncomingMessage) -> Result<InsertOutcome, SqliteStoreError> {
        let created_at =
            UtcTimestamp::now().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))?;
        let changed = guard
            .execute(
                "INSERT INTO messages (message_id, from_addr, to_addr, ts, body_text, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(message_id) DO NOTHING",
                params![
                    message.message_id.as_str(),
                    message.from,
                    message.to,
                    message.ts.as_str(),
                    message.text,
                    created_at.as_str()
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Runs a filtered page query plus its total inside one transaction.
    fn query_messages(
        &self,
        filter: &MessageFilter,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage, SqliteStoreError> {
        let (where_clause, filter_params) = build_filter_sql(filter);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let connection = self.read_connection();
        let mut guard = connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let count_refs: Vec<&dyn ToSql> =
            filter_params.iter().map(|value| value as &dyn ToSql).collect();
        let total: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM messages{where_clause}"),
                count_refs.as_slice(),
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut page_refs: Vec<&dyn ToSql> =
            filter_params.iter().map(|value| value as &dyn ToSql).collect();
        page_refs.push(&limit);
        page_refs.push(&offset);
        let rows = {
            let mut statement = tx
                .prepare(&format!(
                    "SELECT message_id, from_addr, to_addr, ts, body_text, created_at FROM \
                     messages{where_clause} ORDER BY ts, message_id LIMIT ? OFFSET ?"
                ))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mapped = statement
                .query_map(page_refs.as_slice(), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mut rows = Vec::new();
            for raw in mapped {
                let (message_id, from, to, ts, text, created_at) =
                    raw.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                rows.push(Message {
                    message_id: MessageId::new(message_id),
                    from,
                    to,
                    ts: parse_stored_ts(&ts)?,
                    text,
                    created_at: parse_stored_ts(&created_at)?,
                });
            }
            rows
        };
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(MessagePage {
            rows,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// Computes ledger-wide aggregates inside one transaction.
    fn aggregate_messages(&self) -> Result<MessageStats, SqliteStoreError> {
        let connection = self.read_connection();
        let mut guard = connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let (total_messages, senders_count): (i64, i64) = tx
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT from_addr) FROM messages",
                params![],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let top_limit = i64::try_from(TOP_SENDERS_LIMIT).unwrap_or(i64::MAX);
        let messages_per_sender = {
            let mut statement = tx
                .prepare(
                    "SELECT from_addr, COUNT(*) AS message_count FROM messages GROUP BY \
                     from_addr ORDER BY message_count DESC, from_addr ASC LIMIT ?1",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mapped = statement
                .query_map(params![top_limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mut senders = Vec::new();
            for raw in mapped {
                let (from, count) = raw.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                senders.push(SenderCount {
                    from,
                    count: u64::try_from(count).unwrap_or(0),
                });
            }
            senders
        };
        let first_message_ts: Option<String> = tx
            .query_row(
                "SELECT ts FROM messages ORDER BY ts ASC, message_id ASC LIMIT 1",
                params![],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let last_message_ts: Option<String> = tx
            .query_row(
                "SELECT ts FROM messages ORDER BY ts DESC, message_id DESC LIMIT 1",
                params![],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        let first_message_ts = match first_message_ts {
            None => None,
            Some(value) => Some(parse_stored_ts(&value)?),
        };
        let last_message_ts = match last_message_ts {
            None => None,
            Some(value) => Some(parse_stored_ts(&value)?),
        };
        Ok(MessageStats {
            total_messages: u64::try_from(total_messages).unwrap_or(0),
            senders_count: u64::try_from(senders_count).unwrap_or(0),
            messages_per_sender,
            first_message_ts,
            last_message_ts,
        })
    }

    /// Verifies the store can execute a trivial read.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the mutex is poisoned or the query
    /// fails.
    fn check_connection(&self) -> Result<(), SqliteStoreError> {
        let connection = self.read_connection();
        let guard = connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

impl MessageStore for SqliteMessageStore {
    fn insert(&self, message: &IncomingMessage) -> Result<InsertOutcome, StoreError> {
        self.insert_message(message).map_err(StoreError::from)
    }

    fn query(
        &self,
        filter: &MessageFilter,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage, StoreError> {
        self.query_messages(filter, limit, offset).map_err(StoreError::from)
    }

    fn aggregate(&self) -> Result<MessageStats, StoreError> {
        self.aggregate_messages().map_err(StoreError::from)
    }

    fn health_check(&self) -> bool {
        self.check_connection().is_ok()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the WHERE clause and bound text parameters for a filter.
///
/// The substring clause uses `instr` over lowered text rather than `LIKE`, so
/// `%` and `_` in the needle match literally and rows without a body never
/// match.
fn build_filter_sql(filter: &MessageFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut params: Vec<String> = Vec::new();
    if let Some(from) = &filter.from {
        clauses.push("from_addr = ?");
        params.push(from.clone());
    }
    if let Some(since) = &filter.since {
        clauses.push("ts >= ?");
        params.push(since.as_str().to_string());
    }
    if let Some(q) = &filter.q {
        clauses.push("(body_text IS NOT NULL AND instr(lower(body_text), lower(?)) > 0)");
        params.push(q.clone());
    }
    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Parses a stored timestamp column, failing closed on corruption.
fn parse_stored_ts(value: &str) -> Result<UtcTimestamp, SqliteStoreError> {
    UtcTimestamp::parse(value)
        .map_err(|_| SqliteStoreError::Corrupt("stored timestamp is malformed".to_string()))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS messages (
                    message_id TEXT PRIMARY KEY,
                    from_addr TEXT NOT NULL,
                    to_addr TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    body_text TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_ts_message_id
                    ON messages (ts, message_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
