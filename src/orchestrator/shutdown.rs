//! Process shutdown: signal handling and the final cancel-all sweep.

use tracing::{error, info};

use crate::models::stop::SHUTDOWN_REASON;

use super::coordinator::{LifecycleCoordinator, ShutdownSummary};

/// Resolve once the process receives Ctrl-C or, on Unix, `SIGTERM`.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Stop every tracked execution before the process exits.
///
/// New Starts are refused from the first moment of the sweep; Status and
/// Cancel are still served. Never fails: a sweep that cannot even list
/// executions is logged and reported as empty.
pub async fn graceful_shutdown(coordinator: &LifecycleCoordinator) -> ShutdownSummary {
    coordinator.begin_shutdown();
    let summary = match coordinator.cancel_all(SHUTDOWN_REASON).await {
        Ok(summary) => summary,
        Err(err) => {
            error!(%err, "shutdown sweep could not list executions");
            ShutdownSummary::default()
        }
    };

    coordinator.heartbeats().stop_all();
    info!(
        stopped = summary.stopped,
        failed = summary.failed,
        "graceful shutdown complete"
    );
    summary
}
