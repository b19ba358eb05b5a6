//! `biblio`
//!
//! Terminal front end for the library administration stores
use crate::cli::Cli;
use crate::errors::Error;
use crate::state::AppState;
use anyhow::Error as AnyError;
use clap::Parser as _;
use std::io;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Command line definitions
mod cli;
/// One handler per subcommand, printing what the stores return
mod commands;
/// Error types
mod errors;
/// The stores shared by every command
mod state;

#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Executed once per run, never across crate boundaries"
)]
#[allow(
    clippy::print_stderr,
    reason = "Tracing might not be available here if run_safe() failed before its initialization"
)]
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    match run_safe(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("biblio: {error:#}");
            ExitCode::from(error.downcast_ref::<Error>().map_or(1, Error::exit_status))
        }
    }
}

/// Encapsulated run function that allows returning errors instead of panicking, so `run()` can
/// turn them into an exit status.
fn run_safe(cli: Cli) -> Result<(), AnyError> {
    // .env may set RUST_LOG, so load it before the subscriber reads the environment
    let dotenv = dotenvy::dotenv();
    init_tracing(cli.verbose)?;
    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(error) if error.not_found() => tracing::debug!("No .env file, using the environment"),
        Err(error) => return Err(error.into()),
    }

    let state = AppState::connect(cli.api_url.as_deref(), cli.json)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(&state, cli.command))?;
    Ok(())
}

/// Logs to stderr; `log` records from the store layer are bridged into `tracing`
fn init_tracing(verbose: u8) -> Result<(), AnyError> {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish()
        .try_init()?;
    Ok(())
}
