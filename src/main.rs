//! Application entry point and runtime setup.

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

mod cli;

/// Initialise file logging and keep the async writer guard alive.
fn init_logging() -> Result<WorkerGuard> {
    let log_file = "nutrimasr.log";
    // Keep stdout free for command output.
    let file_appender = tracing_appender::rolling::never(".", log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

#[tokio::main]
/// Entry point: logging, then the requested command.
async fn main() -> Result<()> {
    let _log_guard = init_logging()?;
    tracing::info!("app starting");
    let args = cli::Cli::parse();
    let res = cli::run(args).await;
    if let Err(ref e) = res {
        tracing::error!("app error: {e}");
    }
    tracing::info!("app exiting");
    res
}
