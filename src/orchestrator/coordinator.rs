//! Execution lifecycle coordination: Start, Status, Cancel and auto-stop.
//!
//! The coordinator owns the registry, the stop ledger, the heartbeat
//! monitor and the per-execution locks. It is the only writer of execution
//! records; the persister it is handed is shared but never mutated by
//! anyone else.
//!
//! All operations on one execution identifier are serialized through
//! [`ExecutionLocks`], so a heartbeat timeout and an orchestrator Cancel for
//! the same execution can never both reach the plugin's cancel operation.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::models::descriptor::{PreflightDescription, PreflightList};
use crate::models::execution::{ExecutionRecord, OpaqueState};
use crate::models::result::{CancelResult, StartResult, StatusResult};
use crate::models::stop::{HEARTBEAT_TIMEOUT_REASON, SHUTDOWN_REASON};
use crate::persistence::StatePersister;
use crate::preflight::{
    BoxFuture, CancelRequest, CancellablePreflight, Preflight, StartRequest, StatusRequest,
};
use crate::registry::{RegisteredPreflight, Registry};
use crate::{AppError, Result};

use super::execution_locks::ExecutionLocks;
use super::heartbeat_monitor::{HeartbeatMonitor, TimeoutCallback};
use super::stop_ledger::StopLedger;

/// Outcome counts of a [`LifecycleCoordinator::cancel_all`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Executions stopped cleanly.
    pub stopped: usize,
    /// Executions whose stop reported an error; their records are still
    /// removed.
    pub failed: usize,
}

/// Orchestrates the lifecycle of every execution in the process.
pub struct LifecycleCoordinator {
    config: Arc<GlobalConfig>,
    registry: Registry,
    persister: Arc<dyn StatePersister>,
    heartbeats: HeartbeatMonitor,
    stop_ledger: StopLedger,
    locks: ExecutionLocks,
    shutting_down: AtomicBool,
    this: Weak<Self>,
}

impl LifecycleCoordinator {
    /// Build a coordinator around a persister.
    ///
    /// Returned in an `Arc` because heartbeat callbacks hold a weak
    /// reference back to the coordinator.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, persister: Arc<dyn StatePersister>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry: Registry::new(&config.heartbeat),
            heartbeats: HeartbeatMonitor::new(config.heartbeat.clone()),
            stop_ledger: StopLedger::new(config.stop_ledger.capacity),
            locks: ExecutionLocks::new(),
            shutting_down: AtomicBool::new(false),
            persister,
            config,
            this: this.clone(),
        })
    }

    /// Register a check without cancel capability.
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn register<P: Preflight>(&self, check: P) -> Result<PreflightDescription> {
        self.registry.register(check)
    }

    /// Register a check with cancel capability.
    ///
    /// # Errors
    ///
    /// See [`Registry::register_cancellable`].
    pub fn register_cancellable<P: CancellablePreflight>(
        &self,
        check: P,
    ) -> Result<PreflightDescription> {
        self.registry.register_cancellable(check)
    }

    /// Resolved descriptor of a registered check.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckNotRegistered` if the identifier is unknown.
    pub fn describe(&self, check_id: &str) -> Result<PreflightDescription> {
        self.registry.lookup(check_id).map(|check| check.descriptor)
    }

    /// Discovery endpoints of every registered check.
    #[must_use]
    pub fn list(&self) -> PreflightList {
        self.registry.list()
    }

    /// Start an execution.
    ///
    /// A plugin failure is returned inside the result and leaves nothing
    /// tracked. On success the state is persisted and, for cancellable
    /// checks, a heartbeat watchdog is armed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckNotRegistered`, `AppError::ExecutionAlreadyTracked`,
    /// `AppError::StateConversion`, `AppError::Persistence`, or
    /// `AppError::ShuttingDown` once [`begin_shutdown`](Self::begin_shutdown)
    /// has been called.
    pub async fn start(
        &self,
        check_id: &str,
        execution_id: Uuid,
        payload: OpaqueState,
    ) -> Result<StartResult> {
        let span = info_span!("preflight_start", check_id, execution_id = %execution_id);
        self.run_start(check_id, execution_id, payload)
            .instrument(span)
            .await
    }

    async fn run_start(
        &self,
        check_id: &str,
        execution_id: Uuid,
        payload: OpaqueState,
    ) -> Result<StartResult> {
        let check = self.registry.lookup(check_id)?;
        let _guard = self.locks.acquire(execution_id).await;

        if self.is_shutting_down() {
            return Err(AppError::ShuttingDown(format!(
                "not starting execution {execution_id}"
            )));
        }

        match self.persister.get(execution_id).await {
            Ok(_) => return Err(AppError::ExecutionAlreadyTracked(execution_id.to_string())),
            Err(AppError::StateNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let request = StartRequest {
            execution_id,
            check_id: check_id.to_owned(),
            payload,
            work_dir: self.config.execution_work_dir(execution_id),
        };
        let invocation = check.implementation.start(&request).await?;

        let outcome = match invocation.outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "preflight start failed");
                return Ok(StartResult {
                    state: invocation.state,
                    error: Some(error),
                });
            }
        };

        let record = ExecutionRecord::new(
            execution_id,
            check_id.to_owned(),
            invocation.state.clone(),
        );
        if let Err(err) = self.persister.persist(&record).await {
            self.release(execution_id).await;
            return Err(err);
        }

        // A sweep that listed executions before this record landed would miss it.
        if self.is_shutting_down() {
            if let Err(err) = self.stop_tracked(&record, SHUTDOWN_REASON).await {
                warn!(%err, "stopping execution started during shutdown failed");
            }
            return Err(AppError::ShuttingDown(format!(
                "execution {execution_id} stopped after start"
            )));
        }

        if check.supports_cancel() {
            self.heartbeats
                .arm(execution_id, check.poll_interval, self.timeout_callback());
        }

        info!(cancellable = check.supports_cancel(), "preflight started");
        Ok(StartResult {
            state: invocation.state,
            error: outcome.error,
        })
    }

    /// Poll an execution.
    ///
    /// Executions in the stop ledger answer with a synthetic completed
    /// result without reaching the check. A supplied wire state takes
    /// precedence over the persisted one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckNotRegistered`, `AppError::StateNotFound`,
    /// `AppError::StateConversion`, or `AppError::Persistence`.
    pub async fn status(
        &self,
        check_id: &str,
        execution_id: Uuid,
        wire_state: Option<OpaqueState>,
    ) -> Result<StatusResult> {
        let span = info_span!("preflight_status", check_id, execution_id = %execution_id);
        self.run_status(check_id, execution_id, wire_state)
            .instrument(span)
            .await
    }

    async fn run_status(
        &self,
        check_id: &str,
        execution_id: Uuid,
        wire_state: Option<OpaqueState>,
    ) -> Result<StatusResult> {
        let check = self.registry.lookup(check_id)?;
        let _guard = self.locks.acquire(execution_id).await;

        if let Some(stop) = self.stop_ledger.lookup(execution_id) {
            debug!(reason = %stop.reason, "status for stopped execution");
            return Ok(StatusResult::stopped(stop.title()));
        }

        self.heartbeats.record(execution_id);

        let record = self.tracked_record(&check, execution_id).await?;
        let state = wire_state.unwrap_or_else(|| record.state.clone());
        let request = StatusRequest {
            execution_id,
            check_id: check_id.to_owned(),
            work_dir: self.config.execution_work_dir(execution_id),
        };
        let invocation = check.implementation.status(&request, state).await?;

        let outcome = match invocation.outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "preflight status failed");
                return Ok(StatusResult {
                    completed: false,
                    state: None,
                    error: Some(error),
                });
            }
        };

        if outcome.completed && !check.supports_cancel() {
            self.persister.delete(execution_id).await?;
        } else {
            self.persister
                .persist(&record.with_state(invocation.state.clone()))
                .await?;
        }

        if outcome.completed {
            self.heartbeats.stop(execution_id);
            info!("preflight completed");
        }

        Ok(StatusResult {
            completed: outcome.completed,
            state: Some(invocation.state),
            error: outcome.error,
        })
    }

    /// Cancel an execution at the orchestrator's request.
    ///
    /// The record and working directory are removed whatever the check
    /// reports; cleanup failures are logged, never returned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckNotRegistered`, `AppError::CancelNotSupported`,
    /// `AppError::StateNotFound`, `AppError::StateConversion`, or
    /// `AppError::Persistence`.
    pub async fn cancel(
        &self,
        check_id: &str,
        execution_id: Uuid,
        wire_state: Option<OpaqueState>,
    ) -> Result<CancelResult> {
        let span = info_span!("preflight_cancel", check_id, execution_id = %execution_id);
        self.run_cancel(check_id, execution_id, wire_state)
            .instrument(span)
            .await
    }

    async fn run_cancel(
        &self,
        check_id: &str,
        execution_id: Uuid,
        wire_state: Option<OpaqueState>,
    ) -> Result<CancelResult> {
        let check = self.registry.lookup(check_id)?;
        if !check.supports_cancel() {
            return Err(AppError::CancelNotSupported(check_id.to_owned()));
        }

        let _guard = self.locks.acquire(execution_id).await;
        self.heartbeats.stop(execution_id);

        if let Some(stop) = self.stop_ledger.lookup(execution_id) {
            debug!(reason = %stop.reason, "cancel for stopped execution");
            return Ok(CancelResult::stopped(stop.title()));
        }

        let record = self.tracked_record(&check, execution_id).await?;
        let state = wire_state.unwrap_or_else(|| record.state.clone());
        let request = CancelRequest {
            execution_id,
            check_id: check_id.to_owned(),
            work_dir: self.config.execution_work_dir(execution_id),
            stop_reason: None,
        };
        let invocation = match check.implementation.cancel(&request, state) {
            Some(pending) => pending.await,
            None => Err(AppError::CancelNotSupported(check_id.to_owned())),
        };

        self.release(execution_id).await;

        let error = match invocation?.outcome {
            Ok(outcome) => outcome.error,
            Err(error) => {
                warn!(%error, "preflight cancel failed");
                Some(error)
            }
        };
        info!("preflight cancelled");
        Ok(CancelResult { error })
    }

    /// Stop one execution on the engine's own initiative.
    ///
    /// The stop is written to the ledger before the check's cancel runs,
    /// so every later Status or Cancel observes it. An execution that is no
    /// longer tracked is left alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CancellationFailed` if the check's cancel reported
    /// an error, `AppError::CheckNotRegistered` if its check vanished, or
    /// `AppError::Persistence` if the record cannot be read.
    pub async fn auto_stop(&self, execution_id: Uuid, reason: &str) -> Result<()> {
        let span = info_span!("preflight_auto_stop", execution_id = %execution_id, reason);
        self.run_auto_stop(execution_id, reason)
            .instrument(span)
            .await
    }

    async fn run_auto_stop(&self, execution_id: Uuid, reason: &str) -> Result<()> {
        let _guard = self.locks.acquire(execution_id).await;

        let record = match self.persister.get(execution_id).await {
            Ok(record) => record,
            Err(AppError::StateNotFound(_)) => {
                self.heartbeats.stop(execution_id);
                debug!("execution no longer tracked; nothing to stop");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        self.stop_tracked(&record, reason).await
    }

    /// Ledger, disarm, cancel and release a tracked execution. The caller
    /// holds the execution's lock.
    async fn stop_tracked(&self, record: &ExecutionRecord, reason: &str) -> Result<()> {
        let execution_id = record.execution_id;
        self.stop_ledger.record(execution_id, reason);
        self.heartbeats.stop(execution_id);

        let outcome = self.invoke_stop(record, reason).await;
        self.release(execution_id).await;

        match outcome {
            Ok(()) => info!(check_id = %record.check_id, "preflight stopped"),
            Err(ref err) => warn!(check_id = %record.check_id, %err, "preflight stop reported an error"),
        }
        outcome
    }

    async fn invoke_stop(&self, record: &ExecutionRecord, reason: &str) -> Result<()> {
        let check = self.registry.lookup(&record.check_id)?;
        let request = CancelRequest {
            execution_id: record.execution_id,
            check_id: record.check_id.clone(),
            work_dir: self.config.execution_work_dir(record.execution_id),
            stop_reason: Some(reason.to_owned()),
        };

        let Some(pending) = check.implementation.cancel(&request, record.state.clone()) else {
            return Ok(());
        };

        let error = match pending.await?.outcome {
            Ok(outcome) => outcome.error,
            Err(error) => Some(error),
        };
        match error {
            Some(error) => Err(AppError::CancellationFailed(error.to_string())),
            None => Ok(()),
        }
    }

    /// Refuse new executions from now on. Status and Cancel keep working.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        info!("refusing new executions");
    }

    /// Whether [`begin_shutdown`](Self::begin_shutdown) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stop every tracked execution, continuing past individual failures.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` only if the tracked identifiers
    /// cannot be listed.
    pub async fn cancel_all(&self, reason: &str) -> Result<ShutdownSummary> {
        let span = info_span!("preflight_cancel_all", reason);
        async {
            let ids = self.persister.list_ids().await?;
            info!(count = ids.len(), "stopping tracked executions");

            let mut summary = ShutdownSummary::default();
            for execution_id in ids {
                match self.auto_stop(execution_id, reason).await {
                    Ok(()) => summary.stopped += 1,
                    Err(err) => {
                        error!(execution_id = %execution_id, %err, "failed to stop execution");
                        summary.failed += 1;
                    }
                }
            }

            info!(
                stopped = summary.stopped,
                failed = summary.failed,
                "cancel-all sweep complete"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Clear the registry, the stop ledger, every heartbeat watchdog and
    /// the shutdown flag.
    ///
    /// Persisted records are left to the persister's owner.
    pub fn reset(&self) {
        self.shutting_down.store(false, Ordering::SeqCst);
        self.heartbeats.stop_all();
        self.stop_ledger.clear();
        self.registry.reset();
    }

    /// Registered checks.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Recent engine-initiated stops.
    #[must_use]
    pub fn stop_ledger(&self) -> &StopLedger {
        &self.stop_ledger
    }

    /// Heartbeat watchdogs.
    #[must_use]
    pub fn heartbeats(&self) -> &HeartbeatMonitor {
        &self.heartbeats
    }

    /// Backing state store.
    #[must_use]
    pub fn persister(&self) -> &Arc<dyn StatePersister> {
        &self.persister
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Load a record and make sure it belongs to the addressed check.
    async fn tracked_record(
        &self,
        check: &RegisteredPreflight,
        execution_id: Uuid,
    ) -> Result<ExecutionRecord> {
        let record = self.persister.get(execution_id).await?;
        if record.check_id != check.descriptor.id {
            return Err(AppError::StateNotFound(format!(
                "execution {execution_id} does not belong to check {}",
                check.descriptor.id
            )));
        }
        Ok(record)
    }

    /// Best-effort removal of an execution's working directory and record.
    async fn release(&self, execution_id: Uuid) {
        let work_dir = self.config.execution_work_dir(execution_id);
        match std::fs::remove_dir_all(&work_dir) {
            Ok(()) => debug!(path = %work_dir.display(), "working directory removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %work_dir.display(), %err, "failed to remove working directory");
            }
        }

        if let Err(err) = self.persister.delete(execution_id).await {
            warn!(execution_id = %execution_id, %err, "failed to delete execution state");
        }
    }

    fn timeout_callback(&self) -> TimeoutCallback {
        let this = self.this.clone();
        Arc::new(move |execution_id| -> BoxFuture<'static, ()> {
            let this = this.clone();
            Box::pin(async move {
                let Some(coordinator) = this.upgrade() else {
                    return;
                };
                if let Err(err) = coordinator
                    .auto_stop(execution_id, HEARTBEAT_TIMEOUT_REASON)
                    .await
                {
                    error!(execution_id = %execution_id, %err, "heartbeat auto-stop failed");
                }
            })
        })
    }
}
