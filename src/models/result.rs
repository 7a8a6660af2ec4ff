//! Lifecycle results and the structured error payload.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::execution::OpaqueState;

/// Classification carried by a [`PreflightKitError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    /// The operation could not proceed.
    Failed,
    /// The operation proceeded but the check failed or timed out.
    Errored,
}

/// Structured error reported to the orchestrator.
///
/// Also the error type of every plugin operation, so plugin failures are
/// always structured rather than process-level errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightKitError {
    /// Short summary.
    pub title: String,
    /// Optional detail, typically the underlying error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ErrorStatus>,
}

impl PreflightKitError {
    /// Error with only a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
            status: None,
        }
    }

    /// Error classified as [`ErrorStatus::Failed`] with a detail message.
    #[must_use]
    pub fn failed(title: impl Into<String>, detail: impl Display) -> Self {
        Self::new(title)
            .with_detail(detail.to_string())
            .with_status(ErrorStatus::Failed)
    }

    /// Error classified as [`ErrorStatus::Errored`].
    #[must_use]
    pub fn errored(title: impl Into<String>) -> Self {
        Self::new(title).with_status(ErrorStatus::Errored)
    }

    /// Attach a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a classification.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = Some(status);
        self
    }
}

impl Display for PreflightKitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.detail {
            Some(ref detail) => write!(f, "{}: {detail}", self.title),
            None => write!(f, "{}", self.title),
        }
    }
}

impl std::error::Error for PreflightKitError {}

/// Result of a Start call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartResult {
    /// State produced by the check, echoed back on later calls.
    pub state: OpaqueState,
    /// Structured error, if the check reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PreflightKitError>,
}

/// Result of a Status call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusResult {
    /// Whether the execution has finished.
    pub completed: bool,
    /// Updated state, absent for synthetic results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OpaqueState>,
    /// Structured error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PreflightKitError>,
}

impl StatusResult {
    /// Synthetic result for an execution the engine already stopped.
    #[must_use]
    pub fn stopped(title: String) -> Self {
        Self {
            completed: true,
            state: None,
            error: Some(PreflightKitError::errored(title)),
        }
    }
}

/// Result of a Cancel call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancelResult {
    /// Structured error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PreflightKitError>,
}

impl CancelResult {
    /// Synthetic result for an execution the engine already stopped.
    #[must_use]
    pub fn stopped(title: String) -> Self {
        Self {
            error: Some(PreflightKitError::errored(title)),
        }
    }
}
