//! idgate - MCP server for an identity-management API.
//!
//! Keeps one local login session (OS keychain or a file under the home
//! directory) and exposes a filtered set of management-API tools over the
//! MCP stdio transport. Every tool call re-checks the session and logs in
//! again when it has expired.

mod commands;
mod server;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use idgate_core::auth::GrantType;
use idgate_core::store::StoreType;

#[derive(Parser, Debug)]
#[command(name = "idgate")]
#[command(about = "MCP server for an identity-management API, with local session handling")]
#[command(version)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Base directory for the file session store (defaults to the home directory)
    #[arg(long, global = true, value_name = "DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in, replacing any existing session
    Login {
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Remove the stored session
    Logout {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Show the stored session without contacting the identity provider
    Session {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Start the MCP server on stdio
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Where the session is kept: keychain or file
    #[arg(long, default_value_t = StoreType::Keychain)]
    store_type: StoreType,
}

#[derive(Args, Debug, Clone)]
struct AuthArgs {
    /// OAuth2 grant: authorization_code or device_code
    #[arg(long, default_value_t = GrantType::AuthorizationCode)]
    grant_type: GrantType,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    auth: AuthArgs,

    /// Only expose these tools (comma separated)
    #[arg(long, value_delimiter = ',')]
    include_tools: Vec<String>,

    /// Never expose these tools (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude_tools: Vec<String>,

    /// Only expose tools from these collections (comma separated)
    #[arg(long, value_delimiter = ',')]
    include_tool_collections: Vec<String>,

    /// Never expose tools from these collections (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude_tool_collections: Vec<String>,

    /// Also expose tools that modify data
    #[arg(long)]
    disable_read_only: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr because stdout carries the MCP transport. The returned
/// guard flushes the log file and must live until exit.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Token cancelled on Ctrl-C, observed by in-flight logins and the server.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    let cancel = shutdown_token();
    let store_dir = cli.store_dir;

    match cli.command {
        Command::Login { auth } => {
            commands::login::run(auth.grant_type, auth.store.store_type, store_dir, &cancel).await
        }
        Command::Logout { store } => commands::logout::run(store.store_type, store_dir),
        Command::Session { store } => commands::session::run(store.store_type, store_dir),
        Command::Run(args) => {
            let options = commands::run::RunOptions {
                grant_type: args.auth.grant_type,
                store_type: args.auth.store.store_type,
                store_dir,
                include_tools: args.include_tools,
                exclude_tools: args.exclude_tools,
                include_collections: args.include_tool_collections,
                exclude_collections: args.exclude_tool_collections,
                read_only: !args.disable_read_only,
            };
            commands::run::run(options, cancel).await
        }
    }
}
