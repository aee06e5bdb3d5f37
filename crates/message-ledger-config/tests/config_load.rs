// crates/message-ledger-config/tests/config_load.rs
// ============================================================================
// Module: Config Load Tests
// Description: Validate config file resolution, parsing, and env overrides.
// Purpose: Ensure load semantics fail closed and env secrets are applied.
// Dependencies: message-ledger-config, tempfile
// ============================================================================

//! ## Overview
//! End-to-end loading tests against real files on disk. Environment-variable
//! behavior is exercised under a global lock so parallel tests never observe
//! each other's process-wide mutations, and every mutation is restored.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;

use message_ledger_config::ConfigError;
use message_ledger_config::MessageLedgerConfig;
use message_ledger_config::StoreType;
use tempfile::TempDir;

// ============================================================================
// SECTION: Environment Helpers
// ============================================================================

/// Environment variable naming the config file path.
const CONFIG_ENV: &str = "MESSAGE_LEDGER_CONFIG";
/// Environment variable carrying the webhook secret.
const SECRET_ENV: &str = "MESSAGE_LEDGER_WEBHOOK_SECRET";

mod env_mut {
    #![allow(unsafe_code, reason = "Tests mutate process env vars in a controlled scope.")]

    /// Sets an environment variable for the current process.
    pub fn set_var(key: &str, value: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    /// Removes an environment variable from the current process.
    pub fn remove_var(key: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned")
}

struct EnvGuard {
    entries: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn new(names: &[&'static str]) -> Self {
        let entries = names.iter().map(|name| (*name, std::env::var(*name).ok())).collect();
        Self {
            entries,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.entries.drain(..) {
            match value {
                Some(value) => env_mut::set_var(name, &value),
                None => env_mut::remove_var(name),
            }
        }
    }
}

/// Takes the env lock and scrubs both ledger variables for the test body.
fn scrubbed_env() -> (MutexGuard<'static, ()>, EnvGuard) {
    let lock = env_lock();
    let guard = EnvGuard::new(&[CONFIG_ENV, SECRET_ENV]);
    env_mut::remove_var(CONFIG_ENV);
    env_mut::remove_var(SECRET_ENV);
    (lock, guard)
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("message-ledger.toml");
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn load_reads_explicit_file() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "[server]\nbind = \"127.0.0.1:9100\"\n\n[webhook]\nsecret = \"file-secret\"\n",
    );
    let config = MessageLedgerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:9100");
    assert_eq!(config.webhook.secret.as_deref(), Some("file-secret"));
}

#[test]
fn load_fails_when_explicit_file_missing() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let result = MessageLedgerConfig::load(Some(&temp.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn load_without_any_source_yields_defaults() {
    let (_lock, _guard) = scrubbed_env();
    let config = MessageLedgerConfig::load(None).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.webhook.secret, None);
    assert_eq!(config.store.store_type, StoreType::Sqlite);
}

#[test]
fn load_uses_env_path_when_no_explicit_path() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "[server]\nbind = \"127.0.0.1:9200\"\n");
    env_mut::set_var(CONFIG_ENV, &path.to_string_lossy());
    let config = MessageLedgerConfig::load(None).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:9200");
}

#[test]
fn load_fails_when_env_path_missing() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    env_mut::set_var(CONFIG_ENV, &temp.path().join("absent.toml").to_string_lossy());
    let result = MessageLedgerConfig::load(None);
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn explicit_path_wins_over_env_path() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let explicit = write_config(&temp, "[server]\nbind = \"127.0.0.1:9300\"\n");
    let shadowed = temp.path().join("env.toml");
    fs::write(&shadowed, "[server]\nbind = \"127.0.0.1:9400\"\n").unwrap();
    env_mut::set_var(CONFIG_ENV, &shadowed.to_string_lossy());
    let config = MessageLedgerConfig::load(Some(&explicit)).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:9300");
}

#[test]
fn secret_env_overrides_file_value() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "[webhook]\nsecret = \"file-secret\"\n");
    env_mut::set_var(SECRET_ENV, "env-secret");
    let config = MessageLedgerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.webhook.secret.as_deref(), Some("env-secret"));
}

#[test]
fn empty_secret_env_clears_file_value() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "[webhook]\nsecret = \"file-secret\"\n");
    env_mut::set_var(SECRET_ENV, "");
    let config = MessageLedgerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.webhook.secret, None);
}

#[test]
fn secret_env_applies_without_config_file() {
    let (_lock, _guard) = scrubbed_env();
    env_mut::set_var(SECRET_ENV, "env-only-secret");
    let config = MessageLedgerConfig::load(None).unwrap();
    assert_eq!(config.webhook.secret.as_deref(), Some("env-only-secret"));
}

#[test]
fn load_fails_closed_on_invalid_file() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "[server]\nbind = \"not-an-address\"\n");
    let result = MessageLedgerConfig::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn load_fails_closed_on_malformed_toml() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "[server\nbind=");
    let result = MessageLedgerConfig::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn load_rejects_oversize_file() {
    let (_lock, _guard) = scrubbed_env();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("message-ledger.toml");
    fs::write(&path, "#".repeat(1024 * 1024 + 1)).unwrap();
    let result = MessageLedgerConfig::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
