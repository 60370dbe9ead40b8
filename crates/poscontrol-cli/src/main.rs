//! poscontrol - console front end for the point-of-sale admin API.
//!
//! Builds the session store and API gateway once at start-up and hands them
//! to the command that was asked for. Results are printed as JSON on stdout;
//! diagnostics go to stderr.

mod commands;

use std::io;

use anyhow::Result;
use poscontrol_core::{ApiGateway, Config, SessionStore};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

/// Directory for an optional daily log file
const ENV_LOG_DIR: &str = "POSCONTROL_LOG_DIR";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard, which must live until exit so buffered
/// lines are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "poscontrol.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    if matches!(command, Command::Help) {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    info!(base_url = %config.api_base_url, storage = ?config.storage, "poscontrol starting");

    let session = SessionStore::new(config.open_storage()?);
    let gateway = ApiGateway::new(&config, session)?;

    commands::run(command, &gateway).await
}
