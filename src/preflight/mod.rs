//! Plugin-facing preflight abstraction.
//!
//! A check implements [`Preflight`], and additionally
//! [`CancellablePreflight`] when it has leftovers to clean up. The variant is
//! chosen once at registration time
//! ([`Registry::register`](crate::registry::Registry::register) vs
//! [`Registry::register_cancellable`](crate::registry::Registry::register_cancellable)),
//! so the engine never probes for an optional cancel operation at runtime.
//!
//! Every operation receives the check's typed state by mutable reference.
//! The engine converts it to and from the opaque wire document around each
//! call and persists the result.

pub mod adapter;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::models::descriptor::PreflightDescription;
use crate::models::execution::OpaqueState;
use crate::models::result::PreflightKitError;

pub use adapter::{DynPreflight, Invocation};

/// Boxed `Send` future returned by plugin operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a plugin operation; failures are always structured.
pub type PreflightResult<T> = std::result::Result<T, PreflightKitError>;

/// Arguments for a Start call.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Execution being started.
    pub execution_id: Uuid,
    /// Check being executed.
    pub check_id: String,
    /// Opaque initial request document from the orchestrator.
    pub payload: OpaqueState,
    /// Working directory owned by this execution; removed on cancel.
    pub work_dir: PathBuf,
}

/// Arguments for a Status call.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    /// Execution being polled.
    pub execution_id: Uuid,
    /// Check being executed.
    pub check_id: String,
    /// Working directory owned by this execution.
    pub work_dir: PathBuf,
}

/// Arguments for a Cancel call.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    /// Execution being cancelled.
    pub execution_id: Uuid,
    /// Check being executed.
    pub check_id: String,
    /// Working directory owned by this execution.
    pub work_dir: PathBuf,
    /// Set when the engine stops the execution on its own (heartbeat
    /// timeout or shutdown) rather than at the orchestrator's request.
    pub stop_reason: Option<String>,
}

/// Successful Start outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOutcome {
    /// Business error to report while still tracking the execution.
    pub error: Option<PreflightKitError>,
}

/// Successful Status outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOutcome {
    /// Whether the check has finished.
    pub completed: bool,
    /// Business error, e.g. an `Errored` check verdict.
    pub error: Option<PreflightKitError>,
}

impl StatusOutcome {
    /// The check is still running.
    #[must_use]
    pub fn running() -> Self {
        Self::default()
    }

    /// The check finished.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            completed: true,
            error: None,
        }
    }

    /// Attach a business error.
    #[must_use]
    pub fn with_error(mut self, error: PreflightKitError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Successful Cancel outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Business error to report after cleanup.
    pub error: Option<PreflightKitError>,
}

/// A named asynchronous check exposed to the orchestrator.
pub trait Preflight: Send + Sync + 'static {
    /// Typed progress state; the default value seeds every Start.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// Describe the check. Paths, verbs, and the poll interval may be left
    /// empty; the registry fills in defaults.
    fn describe(&self) -> PreflightDescription;

    /// Begin the check.
    fn start<'a>(
        &'a self,
        request: &'a StartRequest,
        state: &'a mut Self::State,
    ) -> BoxFuture<'a, PreflightResult<StartOutcome>>;

    /// Report progress; called periodically by the orchestrator.
    fn status<'a>(
        &'a self,
        request: &'a StatusRequest,
        state: &'a mut Self::State,
    ) -> BoxFuture<'a, PreflightResult<StatusOutcome>>;
}

/// A check that can clean up after itself.
///
/// Only cancellable checks are armed with a heartbeat watchdog, since an
/// abandoned execution can only be torn down through `cancel`.
pub trait CancellablePreflight: Preflight {
    /// Clean up any leftovers of the execution.
    fn cancel<'a>(
        &'a self,
        request: &'a CancelRequest,
        state: &'a mut Self::State,
    ) -> BoxFuture<'a, PreflightResult<CancelOutcome>>;
}
