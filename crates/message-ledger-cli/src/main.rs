// crates/message-ledger-cli/src/main.rs
// ============================================================================
// Module: Message Ledger CLI Entry Point
// Description: Command dispatcher for serving, sending, and signing payloads.
// Purpose: Provide a safe CLI for the ledger server and webhook producers.
// Dependencies: clap, message-ledger-config, message-ledger-http, reqwest, tokio
// ============================================================================

//! ## Overview
//! The message ledger CLI starts the ingestion server and offers producer
//! conveniences for signing and delivering webhook payloads. Security posture:
//! payload files and stdin are untrusted; all reads are size-limited and the
//! shared secret is never echoed back to any output stream.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use message_ledger_config::MessageLedgerConfig;
use message_ledger_core::sign;
use message_ledger_http::HttpServer;
use message_ledger_http::SIGNATURE_HEADER;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a payload read from a file or stdin.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
/// Request timeout applied to `send` deliveries.
const SEND_TIMEOUT: Duration = Duration::from_millis(5_000);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "message-ledger", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the message ledger HTTP server.
    Serve(ServeCommand),
    /// Sign a payload and deliver it to a running ledger.
    Send(SendCommand),
    /// Print the hex HMAC digest for a payload.
    Sign(SignCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to message-ledger.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Bind address override for the HTTP listener.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Configuration for the `send` command.
#[derive(Args, Debug)]
struct SendCommand {
    /// Webhook endpoint URL.
    #[arg(long, value_name = "URL")]
    url: String,
    /// Shared secret used to sign the payload.
    #[arg(long, value_name = "SECRET")]
    secret: String,
    /// Raw JSON payload file; mutually exclusive with the field arguments.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["message_id", "from", "to", "ts", "text"]
    )]
    body: Option<PathBuf>,
    /// Message identifier.
    #[arg(long, value_name = "ID", required_unless_present = "body")]
    message_id: Option<String>,
    /// Sender address in `+<digits>` form.
    #[arg(long, value_name = "ADDR", required_unless_present = "body")]
    from: Option<String>,
    /// Recipient address in `+<digits>` form.
    #[arg(long, value_name = "ADDR", required_unless_present = "body")]
    to: Option<String>,
    /// Send time in `YYYY-MM-DDTHH:MM:SSZ` form.
    #[arg(long, value_name = "TS", required_unless_present = "body")]
    ts: Option<String>,
    /// Optional message text.
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,
}

/// Configuration for the `sign` command.
#[derive(Args, Debug)]
struct SignCommand {
    /// Shared secret used to compute the digest.
    #[arg(long, value_name = "SECRET")]
    secret: String,
    /// Payload file; stdin is read when absent.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("message-ledger {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Send(command) => command_send(command).await,
        Commands::Sign(command) => command_sign(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = MessageLedgerConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("Failed to load config: {err}")))?;
    if let Some(bind) = command.bind {
        config.server.bind = bind;
    }
    let bind = config.server.bind.clone();

    let server = tokio::task::spawn_blocking(move || HttpServer::from_config(config))
        .await
        .map_err(|err| {
            CliError::new(format!("Failed to initialize server: init join failed: {err}"))
        })?
        .map_err(|err| CliError::new(format!("Failed to initialize server: {err}")))?;
    let store_mode = server.store_mode();
    write_stderr_line(&format!("Listening on {bind} (store: {})", store_mode.as_str()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("Server failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Send Command
// ============================================================================

/// Executes the `send` command.
///
/// Prints the response status code and body to stdout; exits nonzero when the
/// server reports a non-success status.
async fn command_send(command: SendCommand) -> CliResult<ExitCode> {
    let body = build_send_body(&command)?;
    let signature = sign(&command.secret, &body)
        .map_err(|err| CliError::new(format!("Failed to sign payload: {err}")))?;

    let client = reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .redirect(Policy::none())
        .build()
        .map_err(|err| CliError::new(format!("Failed to build HTTP client: {err}")))?;
    let response = client
        .post(&command.url)
        .header(SIGNATURE_HEADER, signature)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|err| CliError::new(format!("Request to {} failed: {err}", command.url)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| CliError::new(format!("Failed to read response body: {err}")))?;
    write_stdout_line(&format!("{} {text}", status.as_u16()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Builds the request payload from a file or the field arguments.
fn build_send_body(command: &SendCommand) -> CliResult<Vec<u8>> {
    if let Some(path) = command.body.as_deref() {
        return payload_from_file(path);
    }
    let message_id = require_field(command.message_id.as_deref(), "--message-id")?;
    let from = require_field(command.from.as_deref(), "--from")?;
    let to = require_field(command.to.as_deref(), "--to")?;
    let ts = require_field(command.ts.as_deref(), "--ts")?;

    let mut fields = Map::new();
    fields.insert("message_id".to_string(), Value::String(message_id.to_string()));
    fields.insert("from".to_string(), Value::String(from.to_string()));
    fields.insert("to".to_string(), Value::String(to.to_string()));
    fields.insert("ts".to_string(), Value::String(ts.to_string()));
    if let Some(text) = command.text.as_deref() {
        fields.insert("text".to_string(), Value::String(text.to_string()));
    }
    serde_json::to_vec(&Value::Object(fields))
        .map_err(|err| CliError::new(format!("Failed to encode payload: {err}")))
}

/// Returns a field argument value or a missing-argument error.
fn require_field<'a>(value: Option<&'a str>, flag: &str) -> CliResult<&'a str> {
    value.ok_or_else(|| CliError::new(format!("{flag} is required when --body is not given")))
}

// ============================================================================
// SECTION: Sign Command
// ============================================================================

/// Executes the `sign` command.
fn command_sign(command: &SignCommand) -> CliResult<ExitCode> {
    let payload = match command.input.as_deref() {
        Some(path) => payload_from_file(path)?,
        None => read_stdin_with_limit(MAX_PAYLOAD_BYTES).map_err(|err| match err {
            ReadLimitError::Io(err) => CliError::new(format!("Cannot read stdin: {err}")),
            ReadLimitError::TooLarge {
                size,
                limit,
            } => CliError::new(format!(
                "Stdin payload is {size} bytes; the payload limit is {limit} bytes"
            )),
        })?,
    };
    let digest = sign(&command.secret, &payload)
        .map_err(|err| CliError::new(format!("Failed to sign payload: {err}")))?;
    write_stdout_line(&digest).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded payload reads.
#[derive(Debug)]
enum ReadLimitError {
    /// Payload I/O failure.
    Io(std::io::Error),
    /// Payload size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a payload file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads payload bytes from stdin while enforcing a hard size limit.
fn read_stdin_with_limit(max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let mut limited = std::io::stdin().lock().take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Loads a payload file for `send` and `sign` with CLI error mapping.
fn payload_from_file(path: &Path) -> CliResult<Vec<u8>> {
    read_bytes_with_limit(path, MAX_PAYLOAD_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(format!("Cannot read {}: {err}", path.display())),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is {size} bytes; the payload limit is {limit} bytes",
            path.display()
        )),
    })
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("Failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
