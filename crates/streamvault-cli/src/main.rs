//! StreamVault CLI - a command-line front end for the StreamVault backend.
//!
//! Signs in, keeps the session between runs, and issues authenticated API
//! calls through the session client so expired tokens are refreshed
//! transparently.

mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use streamvault_core::auth::Session;
use streamvault_core::{Config, Notice, NoticeLevel, Notifier, SessionClient};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "streamvault.log";

const USAGE: &str = "\
Usage: streamvault <command> [args]

Commands:
  login [username] [--remember]   Sign in (prompts for missing values)
  signup <username> <email>       Register a new account
  logout [--forget]               Sign out and clear the saved session
  whoami                          Restore and show the signed-in user
  admin                           Report whether the user is an admin
  refresh                         Exchange the current token for a new one
  get <path>                      Authenticated GET, prints the JSON body
  post <path> [json]              Authenticated POST, prints the JSON body
  avatar <url>                    Set the avatar URL
  profile <image-file>            Upload a new avatar image
  base-url                        Print the resolved backend URL

Environment:
  STREAMVAULT_API_BASE_URL        Backend origin (\"/api\" is appended)
  STREAMVAULT_HOST                Host name used to pick a default backend
  RUST_LOG                        Log filter (default: warn)";

/// Prints notices the way the web client shows toasts.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => eprintln!("✓ {}", notice.message),
            NoticeLevel::Error => eprintln!("✗ {}", notice.message),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load().context("Failed to load config")?;
    let cache_dir = config.cache_dir()?;
    let log_dir = std::fs::create_dir_all(&cache_dir).ok().map(|_| cache_dir.as_path());
    let _log_guard = init_tracing(log_dir);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let base_url = config.api_base_url();
    if command == "base-url" {
        println!("{}", base_url);
        return Ok(());
    }

    let mut session = Session::new(cache_dir.clone());
    match session.load() {
        Ok(true) => info!("Saved session restored"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable saved session"),
    }

    info!(base_url = %base_url, command = %command, "StreamVault CLI starting");
    let client = SessionClient::connect(&base_url, session, Arc::new(ConsoleNotifier))?;

    match command.as_str() {
        "login" => commands::login(&client, &mut config, rest).await,
        "signup" => commands::signup(&client, rest).await,
        "logout" => commands::logout(&client, &config, rest).await,
        "whoami" => commands::whoami(&client).await,
        "admin" => commands::admin(&client).await,
        "refresh" => commands::refresh(&client).await,
        "get" => commands::get(&client, rest).await,
        "post" => commands::post(&client, rest).await,
        "avatar" => commands::avatar(&client, rest).await,
        "profile" => commands::profile(&client, rest).await,
        other => {
            eprintln!("{}", USAGE);
            Err(anyhow::anyhow!("Unknown command: {}", other))
        }
    }
}
