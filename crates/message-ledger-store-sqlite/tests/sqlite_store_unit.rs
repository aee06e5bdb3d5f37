// crates/message-ledger-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Message Store Tests
// Description: Validate SQLite MessageStore behavior.
// Purpose: Ensure idempotent persistence, ordering, filtering, and stats.
// Dependencies: message-ledger-store-sqlite, message-ledger-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed message store. Exercises
//! first-write-wins inserts under concurrency, snapshot-consistent paging,
//! filter composition, aggregation, and fail-closed behavior on corrupted
//! rows and incompatible schema versions.

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use message_ledger_core::IncomingMessage;
use message_ledger_core::MessageFilter;
use message_ledger_core::MessageId;
use message_ledger_core::MessageStore;
use message_ledger_core::StoreError;
use message_ledger_core::UtcTimestamp;
use message_ledger_store_sqlite::SqliteMessageStore;
use message_ledger_store_sqlite::SqliteStoreConfig;
use message_ledger_store_sqlite::SqliteStoreError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn incoming(id: &str, from: &str, ts: &str, text: Option<&str>) -> IncomingMessage {
    IncomingMessage {
        message_id: MessageId::new(id),
        from: from.to_string(),
        to: "+19999999999".to_string(),
        ts: UtcTimestamp::parse(ts).expect("valid ts"),
        text: text.map(str::to_string),
    }
}

fn store_for(path: &std::path::Path) -> SqliteMessageStore {
    SqliteMessageStore::new(&SqliteStoreConfig::with_path(path)).expect("store init")
}

fn q_filter(needle: &str) -> MessageFilter {
    MessageFilter {
        q: Some(needle.to_string()),
        ..MessageFilter::default()
    }
}

// ============================================================================
// SECTION: Insert Semantics
// ============================================================================

#[test]
fn sqlite_store_reports_inserted_then_duplicate() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let first = store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();
    let second = store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
}

#[test]
fn sqlite_store_first_write_wins() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", Some("first"))).unwrap();
    store.insert(&incoming("m1", "+15550002", "2025-06-06T00:00:00Z", Some("second"))).unwrap();
    let page = store.query(&MessageFilter::default(), 50, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].from, "+15550001");
    assert_eq!(page.rows[0].ts.as_str(), "2025-01-01T00:00:00Z");
    assert_eq!(page.rows[0].text.as_deref(), Some("first"));
}

#[test]
fn sqlite_store_assigns_parseable_created_at() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();
    let page = store.query(&MessageFilter::default(), 50, 0).unwrap();
    assert!(UtcTimestamp::parse(page.rows[0].created_at.as_str()).is_ok());
}

#[test]
fn sqlite_store_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    {
        let store = store_for(&path);
        store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", Some("kept"))).unwrap();
    }
    let store = store_for(&path);
    let page = store.query(&MessageFilter::default(), 50, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].text.as_deref(), Some("kept"));
}

#[test]
fn sqlite_store_concurrent_same_key_inserts_collapse_to_one_row() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = std::sync::Arc::new(store_for(&path));
    let mut handles = Vec::new();

    for index in 0 .. 10 {
        let store = std::sync::Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            let text = format!("attempt-{index}");
            let outcome = store
                .insert(&incoming("m-race", "+15550001", "2025-01-01T00:00:00Z", Some(&text)))
                .unwrap();
            outcome.is_duplicate()
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if !handle.join().unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1, "exactly one insert should win");

    let connection = rusqlite::Connection::open(&path).unwrap();
    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM messages", rusqlite::params![], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

// ============================================================================
// SECTION: Query Semantics
// ============================================================================

#[test]
fn sqlite_store_orders_by_ts_then_message_id() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("b", "+15550001", "2025-01-02T00:00:00Z", None)).unwrap();
    store.insert(&incoming("d", "+15550001", "2025-01-03T00:00:00Z", None)).unwrap();
    store.insert(&incoming("a", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();
    store.insert(&incoming("c", "+15550001", "2025-01-03T00:00:00Z", None)).unwrap();
    let page = store.query(&MessageFilter::default(), 50, 0).unwrap();
    let ids: Vec<&str> = page.rows.iter().map(|row| row.message_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

#[test]
fn sqlite_store_pagination_windows_rows_and_keeps_total() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    for index in 1 ..= 5 {
        let ts = format!("2025-01-0{index}T00:00:00Z");
        store.insert(&incoming(&format!("m{index}"), "+15550001", &ts, None)).unwrap();
    }
    let page = store.query(&MessageFilter::default(), 2, 2).unwrap();
    assert_eq!(page.total, 5);
    let ids: Vec<&str> = page.rows.iter().map(|row| row.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m3", "m4"]);
}

#[test]
fn sqlite_store_since_is_inclusive() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();
    store.insert(&incoming("m2", "+15550001", "2025-01-02T00:00:00Z", None)).unwrap();
    let filter = MessageFilter {
        since: Some(UtcTimestamp::parse("2025-01-02T00:00:00Z").unwrap()),
        ..MessageFilter::default()
    };
    let page = store.query(&filter, 50, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].message_id.as_str(), "m2");
}

#[test]
fn sqlite_store_q_is_case_insensitive_and_skips_null_text() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store
        .insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", Some("Hello World")))
        .unwrap();
    store.insert(&incoming("m2", "+15550001", "2025-01-02T00:00:00Z", None)).unwrap();
    let page = store.query(&q_filter("WORLD"), 50, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].message_id.as_str(), "m1");
}

#[test]
fn sqlite_store_q_treats_like_wildcards_literally() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", Some("a_b"))).unwrap();
    store.insert(&incoming("m2", "+15550001", "2025-01-02T00:00:00Z", Some("axb"))).unwrap();
    store.insert(&incoming("m3", "+15550001", "2025-01-03T00:00:00Z", Some("100% done"))).unwrap();
    let underscore = store.query(&q_filter("a_b"), 50, 0).unwrap();
    assert_eq!(underscore.total, 1);
    assert_eq!(underscore.rows[0].message_id.as_str(), "m1");
    let percent = store.query(&q_filter("0% d"), 50, 0).unwrap();
    assert_eq!(percent.total, 1);
    assert_eq!(percent.rows[0].message_id.as_str(), "m3");
}

#[test]
fn sqlite_store_filters_compose_with_and() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", Some("alpha"))).unwrap();
    store.insert(&incoming("m2", "+15550001", "2025-01-03T00:00:00Z", Some("alpha"))).unwrap();
    store.insert(&incoming("m3", "+15550002", "2025-01-03T00:00:00Z", Some("alpha"))).unwrap();
    let filter = MessageFilter {
        from: Some("+15550001".to_string()),
        since: Some(UtcTimestamp::parse("2025-01-02T00:00:00Z").unwrap()),
        q: Some("ALPHA".to_string()),
    };
    let page = store.query(&filter, 50, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].message_id.as_str(), "m2");
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

#[test]
fn sqlite_store_aggregate_empty_ledger_is_all_zero() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let stats = store.aggregate().unwrap();
    assert_eq!(stats.total_messages, 0);
    assert_eq!(stats.senders_count, 0);
    assert!(stats.messages_per_sender.is_empty());
    assert_eq!(stats.first_message_ts, None);
    assert_eq!(stats.last_message_ts, None);
}

#[test]
fn sqlite_store_aggregate_counts_senders_and_bounds() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.insert(&incoming("m1", "+15550001", "2025-01-02T00:00:00Z", None)).unwrap();
    store.insert(&incoming("m2", "+15550001", "2025-01-03T00:00:00Z", None)).unwrap();
    store.insert(&incoming("m3", "+15550002", "2025-01-01T00:00:00Z", None)).unwrap();
    let stats = store.aggregate().unwrap();
    assert_eq!(stats.total_messages, 3);
    assert_eq!(stats.senders_count, 2);
    assert_eq!(stats.messages_per_sender[0].from, "+15550001");
    assert_eq!(stats.messages_per_sender[0].count, 2);
    assert_eq!(stats.messages_per_sender[1].from, "+15550002");
    assert_eq!(stats.first_message_ts.as_ref().map(|ts| ts.as_str()), Some("2025-01-01T00:00:00Z"));
    assert_eq!(stats.last_message_ts.as_ref().map(|ts| ts.as_str()), Some("2025-01-03T00:00:00Z"));
}

#[test]
fn sqlite_store_aggregate_caps_top_senders_at_ten() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    for index in 0 .. 12 {
        let id = format!("m{index}");
        let from = format!("+1555{index:04}");
        store.insert(&incoming(&id, &from, "2025-01-01T00:00:00Z", None)).unwrap();
    }
    let stats = store.aggregate().unwrap();
    assert_eq!(stats.senders_count, 12);
    assert_eq!(stats.messages_per_sender.len(), 10);
}

// ============================================================================
// SECTION: Failure Modes
// ============================================================================

#[test]
fn sqlite_store_rejects_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    drop(store_for(&path));

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 999", rusqlite::params![]).unwrap();
    drop(connection);

    let result = SqliteMessageStore::new(&SqliteStoreConfig::with_path(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn sqlite_store_fails_closed_on_corrupt_stored_ts() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    store.insert(&incoming("m1", "+15550001", "2025-01-01T00:00:00Z", None)).unwrap();

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection
        .execute("UPDATE messages SET ts = 'garbage' WHERE message_id = 'm1'", rusqlite::params![])
        .unwrap();
    drop(connection);

    let result = store.query(&MessageFilter::default(), 50, 0);
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteMessageStore::new(&SqliteStoreConfig::with_path(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_overlong_path_component() {
    let temp = TempDir::new().unwrap();
    let component = "x".repeat(300);
    let config = SqliteStoreConfig::with_path(temp.path().join(component));
    let result = SqliteMessageStore::new(&config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_zero_read_pool() {
    let temp = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::with_path(temp.path().join("store.sqlite"));
    config.read_pool_size = 0;
    let result = SqliteMessageStore::new(&config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_health_check_reports_true_when_open() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    assert!(store.health_check());
}
