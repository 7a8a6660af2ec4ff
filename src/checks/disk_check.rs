//! `disk-check`: verifies the execution working directory is writable.
//!
//! Start creates the directory, each Status writes a probe file into it and
//! advances one step, and the check completes on the second successful
//! probe. The coordinator removes the directory on cancel.

use std::fs;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::descriptor::{MutatingEndpointReferenceWithCallInterval, PreflightDescription};
use crate::models::result::PreflightKitError;
use crate::preflight::{
    BoxFuture, CancelOutcome, CancelRequest, CancellablePreflight, Preflight, PreflightResult,
    StartOutcome, StartRequest, StatusOutcome, StatusRequest,
};

/// Identifier under which the check registers.
pub const DISK_CHECK_ID: &str = "disk-check";

const PROBE_FILE: &str = "probe";

/// Progress of a disk check.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiskCheckStep {
    /// Working directory created.
    #[default]
    Init,
    /// First probe written.
    Checking,
    /// Second probe written; the check passed.
    Done,
    /// Cancelled before completion.
    Cancelled,
}

/// Typed state of a disk check execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiskCheckState {
    /// Current step.
    pub step: DiskCheckStep,
    /// Path of the last probe file written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_file: Option<String>,
}

/// Cancellable check probing the execution working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCheck;

impl Preflight for DiskCheck {
    type State = DiskCheckState;

    fn describe(&self) -> PreflightDescription {
        PreflightDescription {
            id: DISK_CHECK_ID.to_owned(),
            label: "Disk check".to_owned(),
            description: "Verifies that the execution working directory is writable.".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            status: MutatingEndpointReferenceWithCallInterval {
                call_interval: Some("5s".to_owned()),
                ..MutatingEndpointReferenceWithCallInterval::default()
            },
            ..PreflightDescription::default()
        }
    }

    fn start<'a>(
        &'a self,
        request: &'a StartRequest,
        state: &'a mut DiskCheckState,
    ) -> BoxFuture<'a, PreflightResult<StartOutcome>> {
        Box::pin(async move {
            fs::create_dir_all(&request.work_dir).map_err(|err| {
                PreflightKitError::failed("Failed to create working directory.", err)
            })?;
            state.step = DiskCheckStep::Init;
            state.probe_file = None;
            Ok(StartOutcome::default())
        })
    }

    fn status<'a>(
        &'a self,
        request: &'a StatusRequest,
        state: &'a mut DiskCheckState,
    ) -> BoxFuture<'a, PreflightResult<StatusOutcome>> {
        Box::pin(async move {
            let next = match state.step {
                DiskCheckStep::Init => DiskCheckStep::Checking,
                DiskCheckStep::Checking | DiskCheckStep::Done => DiskCheckStep::Done,
                DiskCheckStep::Cancelled => {
                    return Ok(StatusOutcome::completed()
                        .with_error(PreflightKitError::errored("Disk check was cancelled.")));
                }
            };

            fs::create_dir_all(&request.work_dir)
                .map_err(|err| PreflightKitError::failed("Failed to create working directory.", err))?;
            let probe = request.work_dir.join(PROBE_FILE);
            fs::write(&probe, request.execution_id.to_string())
                .map_err(|err| PreflightKitError::failed("Failed to write probe file.", err))?;
            debug!(path = %probe.display(), "probe file written");

            state.step = next;
            state.probe_file = Some(probe.display().to_string());

            Ok(if next == DiskCheckStep::Done {
                StatusOutcome::completed()
            } else {
                StatusOutcome::running()
            })
        })
    }
}

impl CancellablePreflight for DiskCheck {
    fn cancel<'a>(
        &'a self,
        _request: &'a CancelRequest,
        state: &'a mut DiskCheckState,
    ) -> BoxFuture<'a, PreflightResult<CancelOutcome>> {
        Box::pin(async move {
            state.step = DiskCheckStep::Cancelled;
            Ok(CancelOutcome::default())
        })
    }
}
