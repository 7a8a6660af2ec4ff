#![forbid(unsafe_code)]

//! `preflight-kit`: preflight check host binary.
//!
//! Bootstraps configuration and persistence, registers the bundled checks,
//! serves the HTTP dispatcher, and stops every tracked execution before
//! exiting.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use preflight_kit::checks::DiskCheck;
use preflight_kit::config::GlobalConfig;
use preflight_kit::http::server;
use preflight_kit::orchestrator::shutdown::{graceful_shutdown, shutdown_signal};
use preflight_kit::orchestrator::LifecycleCoordinator;
use preflight_kit::persistence;
use preflight_kit::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "preflight-kit", about = "Preflight check host", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the dispatcher listen port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("preflight-kit bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.validate()?;
    let config = Arc::new(config);
    info!(
        backend = ?config.persistence.backend,
        work_dir_root = %config.work_dir_root.display(),
        "configuration loaded"
    );

    // ── Persistence and coordinator ─────────────────────
    let persister = persistence::from_config(&config).await?;
    let coordinator = LifecycleCoordinator::new(Arc::clone(&config), persister);
    coordinator.register_cancellable(DiskCheck)?;

    // ── Start dispatcher ────────────────────────────────
    let listener = server::bind(&config).await?;
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_coordinator = Arc::clone(&coordinator);
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(listener, server_coordinator, server_ct).await {
            error!(%err, "dispatcher failed");
        }
    });

    info!(checks = coordinator.registry().len(), "preflight-kit ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");

    // Executions are stopped while the dispatcher still answers, so a
    // concurrent Status observes the stop ledger rather than a refused
    // connection.
    graceful_shutdown(&coordinator).await;
    ct.cancel();

    if let Err(err) = server_handle.await {
        error!(%err, "dispatcher task panicked");
    }
    info!("preflight-kit shut down");

    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
