//! Record of an execution stopped by the engine itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason recorded when the heartbeat watchdog stops an execution.
pub const HEARTBEAT_TIMEOUT_REASON: &str = "heartbeat timeout";

/// Reason recorded by the process shutdown sweep.
pub const SHUTDOWN_REASON: &str = "process shutdown";

/// An auto-stop entry held by the stop ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StopRecord {
    /// Stopped execution.
    pub execution_id: Uuid,
    /// Human-readable reason, e.g. `"heartbeat timeout"`.
    pub reason: String,
    /// When the stop was recorded.
    pub stopped_at: DateTime<Utc>,
}

impl StopRecord {
    /// Construct a stop record timestamped now.
    #[must_use]
    pub fn new(execution_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            execution_id,
            reason: reason.into(),
            stopped_at: Utc::now(),
        }
    }

    /// Error title reported to callers polling a stopped execution.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Preflight was stopped by extension: {}", self.reason)
    }
}
