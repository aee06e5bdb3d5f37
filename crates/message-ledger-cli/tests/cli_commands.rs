// crates/message-ledger-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the sign, send, and serve commands.
// Purpose: Ensure the CLI signs payloads correctly and fails closed on errors.
// Dependencies: message-ledger binary
// ============================================================================

//! ## Overview
//! Runs the CLI binary end to end for signing workflows and verifies serve and
//! send reject invalid inputs with explicit errors.
//!
//! Security posture: configuration and payload inputs are untrusted; failures
//! must be reported before any network or store activity.

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
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// HMAC-SHA256 digest of `abc` under the secret `secret`.
const ABC_DIGEST: &str = "9946dad4e00e913fc8be8e5d3f7e110a4a9e832f83fb09c345285d78638d8a0e";

fn message_ledger_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_message-ledger"))
}

fn temp_root(label: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock drift").as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("message-ledger-cli-{label}-{nanos}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn cleanup(path: &PathBuf) {
    let _ = fs::remove_dir_all(path);
}

// ============================================================================
// SECTION: Sign Tests
// ============================================================================

/// Verifies `sign` prints the expected digest for a payload file.
#[test]
fn cli_sign_prints_digest_for_file() {
    let root = temp_root("sign-file");
    let payload_path = root.join("payload.bin");
    fs::write(&payload_path, b"abc").expect("write payload");

    let output = Command::new(message_ledger_bin())
        .args(["sign", "--secret", "secret", "--input", payload_path.to_string_lossy().as_ref()])
        .output()
        .expect("run message-ledger sign");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), ABC_DIGEST);

    cleanup(&root);
}

/// Verifies `sign` reads the payload from stdin when no input file is given.
#[test]
fn cli_sign_reads_stdin() {
    let mut child = Command::new(message_ledger_bin())
        .args(["sign", "--secret", "secret"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn message-ledger sign");
    child
        .stdin
        .take()
        .expect("child stdin")
        .write_all(b"abc")
        .expect("write stdin payload");

    let output = child.wait_with_output().expect("wait for sign");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), ABC_DIGEST);
}

/// Verifies `sign` fails closed when the payload file is missing.
#[test]
fn cli_sign_rejects_missing_file() {
    let root = temp_root("sign-missing");
    let payload_path = root.join("absent.bin");

    let output = Command::new(message_ledger_bin())
        .args(["sign", "--secret", "secret", "--input", payload_path.to_string_lossy().as_ref()])
        .output()
        .expect("run message-ledger sign");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cannot read"), "unexpected stderr: {stderr}");

    cleanup(&root);
}

// ============================================================================
// SECTION: Send Tests
// ============================================================================

/// Verifies `send` requires either a body file or the full field arguments.
#[test]
fn cli_send_requires_body_or_fields() {
    let output = Command::new(message_ledger_bin())
        .args(["send", "--url", "http://127.0.0.1:9/webhook", "--secret", "secret"])
        .output()
        .expect("run message-ledger send");

    assert!(!output.status.success());
}

/// Verifies `send` reports delivery failures against unreachable endpoints.
#[test]
fn cli_send_reports_unreachable_endpoint() {
    // Port 9 (discard) is reserved and not expected to accept connections.
    let output = Command::new(message_ledger_bin())
        .args([
            "send",
            "--url",
            "http://127.0.0.1:9/webhook",
            "--secret",
            "secret",
            "--message-id",
            "m-1",
            "--from",
            "+15551234567",
            "--to",
            "+15557654321",
            "--ts",
            "2026-08-23T10:00:00Z",
        ])
        .output()
        .expect("run message-ledger send");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed"), "unexpected stderr: {stderr}");
}

// ============================================================================
// SECTION: Serve Tests
// ============================================================================

/// Verifies `serve` fails closed when the config file does not parse.
#[test]
fn cli_serve_rejects_invalid_config() {
    let root = temp_root("serve-bad-config");
    let config_path = root.join("message-ledger.toml");
    fs::write(&config_path, "server = not toml").expect("write config");

    let output = Command::new(message_ledger_bin())
        .args(["serve", "--config", config_path.to_string_lossy().as_ref()])
        .output()
        .expect("run message-ledger serve");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"), "unexpected stderr: {stderr}");

    cleanup(&root);
}

/// Verifies `serve` fails closed when the bind override does not parse.
#[test]
fn cli_serve_rejects_invalid_bind_override() {
    let root = temp_root("serve-bad-bind");
    let config_path = root.join("message-ledger.toml");
    fs::write(&config_path, "[server]\nbind = \"127.0.0.1:0\"\n").expect("write config");

    let output = Command::new(message_ledger_bin())
        .args([
            "serve",
            "--config",
            config_path.to_string_lossy().as_ref(),
            "--bind",
            "not-an-address",
        ])
        .output()
        .expect("run message-ledger serve");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to initialize server"), "unexpected stderr: {stderr}");

    cleanup(&root);
}

// ============================================================================
// SECTION: Version Tests
// ============================================================================

/// Verifies the version flag prints the binary name and version.
#[test]
fn cli_version_reports_binary_name() {
    let output = Command::new(message_ledger_bin())
        .args(["--version"])
        .output()
        .expect("run message-ledger --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("message-ledger "), "unexpected stdout: {stdout}");
}
