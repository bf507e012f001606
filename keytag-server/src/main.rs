//! keytag-server - Musical key tagging worker
//!
//! Reads newline-delimited JSON requests on stdin, writes the musical key into each named
//! audio file, and answers with one JSON line per request on stdout. A host application
//! spawns this process and keeps it running; `{"type":"ready"}` announces that the worker
//! pool is up and `{"type":"heartbeat"}` follows periodically.
//!
//! stdout is reserved for protocol messages. Diagnostics go to stderr (or the configured
//! log file).

use anyhow::{Context, Result};
use clap::Parser;
use keytag_common::config::{ConfigOverrides, ServerConfig, ENV_WORKERS};
use keytag_server::logging::{init_logging, with_bootstrap_logging};
use keytag_server::{FileTagger, TaggingServer};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How long runtime shutdown waits on blocking tasks
///
/// A stdin read stays blocked while the host holds the pipe open, so after a signal the
/// runtime cannot wait for it.
const BLOCKING_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Command-line arguments for keytag-server
#[derive(Parser, Debug)]
#[command(name = "keytag-server")]
#[command(about = "Writes musical key tags into audio files over a stdio JSON protocol")]
#[command(version)]
struct Args {
    /// Number of concurrent tagging workers [default: 4]
    #[arg(short, long, env = ENV_WORKERS, value_parser = clap::value_parser!(u64).range(1..))]
    workers: Option<u64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let workers = args
        .workers
        .map(usize::try_from)
        .transpose()
        .context("Worker count out of range")?;
    let overrides = ConfigOverrides {
        workers,
        config_path: args.config,
    };
    let config = with_bootstrap_logging(|| ServerConfig::load(&overrides))
        .context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    info!(
        "Starting keytag-server v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        log_level = %config.logging.level,
        "Configuration resolved"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(serve(config));
    runtime.shutdown_timeout(BLOCKING_SHUTDOWN_TIMEOUT);
    result
}

async fn serve(config: ServerConfig) -> Result<()> {
    // Registered before `ready` so a signal right after it is not lost
    let on_signal = shutdown_signal().context("Failed to install signal handlers")?;
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            on_signal.await;
            shutdown.cancel();
        }
    });

    let server = TaggingServer::new(config, Arc::new(FileTagger::new()));
    let report = server
        .run(tokio::io::stdin(), tokio::io::stdout(), shutdown)
        .await
        .context("Tagging server failed")?;

    info!(
        "Shutdown complete: {} requests, {} rejected lines, {} discarded",
        report.requests_accepted, report.lines_rejected, report.jobs_discarded
    );
    Ok(())
}

/// Future resolving on Ctrl+C or SIGTERM; handlers are installed when this returns
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("Received Ctrl+C, shutting down");
            },
            _ = terminate.recv() => {
                info!("Received terminate signal, shutting down");
            },
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
