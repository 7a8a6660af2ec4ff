//! Listener binding and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::orchestrator::LifecycleCoordinator;
use crate::{AppError, Result};

/// Bind the dispatcher listener on `config.http_host:config.http_port`.
///
/// # Errors
///
/// Returns `AppError::Config` if the address is invalid, or `AppError::Io`
/// if the socket cannot be bound.
pub async fn bind(config: &GlobalConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .map_err(|err| AppError::Config(format!("invalid listen address: {err}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Io(format!("failed to bind dispatcher on {addr}: {err}")))
}

/// Serve the dispatcher until `ct` is cancelled.
///
/// In-flight requests are allowed to finish after cancellation.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<LifecycleCoordinator>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let router = super::router(coordinator);

    info!(%addr, "starting preflight dispatcher");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    info!("preflight dispatcher shut down");
    Ok(())
}
