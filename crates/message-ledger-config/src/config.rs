// crates/message-ledger-config/src/config.rs
// ============================================================================
// Module: Message Ledger Configuration
// Description: Configuration loading and validation for the ledger service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: message-ledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! A present but invalid file fails closed. The implicit default file is the
//! one absence that is tolerated, so the service boots with zero config. The
//! webhook secret can be supplied through the environment so secret material
//! stays out of the config file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use message_ledger_store_sqlite::SqliteJournalMode;
use message_ledger_store_sqlite::SqliteStoreConfig;
use message_ledger_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "message-ledger.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "MESSAGE_LEDGER_CONFIG";
/// Environment variable used to supply the webhook secret.
pub(crate) const SECRET_ENV_VAR: &str = "MESSAGE_LEDGER_WEBHOOK_SECRET";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum webhook secret length in bytes.
pub(crate) const MAX_SECRET_LENGTH: usize = 256;
/// Minimum allowed request body cap in bytes.
pub(crate) const MIN_MAX_BODY_BYTES: usize = 1024;
/// Maximum allowed request body cap in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Maximum allowed read pool size for the sqlite store.
pub(crate) const MAX_STORE_READ_POOL_SIZE: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Message ledger service configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageLedgerConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Webhook ingestion configuration.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Message store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

impl MessageLedgerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then the `MESSAGE_LEDGER_CONFIG`
    /// environment variable, then `./message-ledger.toml`. Only the implicit
    /// default file may be absent; an explicitly named file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var(CONFIG_ENV_VAR).ok().filter(|value| !value.trim().is_empty());
        let required = path.is_some() || env_path.is_some();
        let resolved = resolve_path(path, env_path.as_deref())?;
        validate_path(&resolved)?;
        let mut config = match fs::read(&resolved) {
            Ok(bytes) => Self::parse_bytes(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound && !required => Self::default(),
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the content violates size, encoding, or
    /// TOML syntax constraints.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides on top of file-sourced values.
    ///
    /// `MESSAGE_LEDGER_WEBHOOK_SECRET`, when set, is authoritative for the
    /// webhook secret: a non-empty value replaces the file value and an empty
    /// value clears it.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = env::var(SECRET_ENV_VAR) {
            self.webhook.secret = if secret.is_empty() { None } else { Some(secret) };
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.webhook.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        let _: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))?;
        if !(MIN_MAX_BODY_BYTES ..= MAX_MAX_BODY_BYTES).contains(&self.max_body_bytes) {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be between 1 KiB and 16 MiB".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))
    }
}

/// Webhook ingestion configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    /// Shared secret used to verify webhook signatures.
    ///
    /// Absence is a degraded runtime state, not a startup error: the
    /// webhook endpoint refuses ingestion until a secret is configured.
    #[serde(default)]
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// Validates webhook configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = &self.secret {
            if secret.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "webhook.secret must be non-empty when set".to_string(),
                ));
            }
            if secret.len() > MAX_SECRET_LENGTH {
                return Err(ConfigError::Invalid("webhook.secret exceeds max length".to_string()));
            }
        }
        Ok(())
    }
}

/// Message store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the `SQLite`-backed durable store.
    #[default]
    Sqlite,
    /// Use the in-memory store.
    Memory,
}

/// Message store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections for the sqlite backend.
    #[serde(default = "default_store_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: default_store_path(),
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_store_read_pool_size(),
        }
    }
}

impl StoreConfig {
    /// Validates message store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => Ok(()),
            StoreType::Sqlite => {
                validate_store_path(&self.path)?;
                if self.read_pool_size == 0 || self.read_pool_size > MAX_STORE_READ_POOL_SIZE {
                    return Err(ConfigError::Invalid(
                        "store.read_pool_size must be between 1 and 64".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Builds the sqlite store configuration for this store section.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            read_pool_size: self.read_pool_size,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>, env_path: Option<&str>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env_path {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates the sqlite store path against length constraints.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("store.path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("store.path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("store.path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default HTTP bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default sqlite database path.
fn default_store_path() -> PathBuf {
    PathBuf::from("message-ledger.db")
}

/// Default sqlite busy timeout in milliseconds.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Default sqlite read pool size.
const fn default_store_read_pool_size() -> usize {
    2
}

// ============================================================================
// SECTION: Tests
// ============================================================================
