//! Tracked execution record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque per-execution progress document exchanged with the orchestrator.
pub type OpaqueState = Value;

/// State of one running execution, owned by the coordinator.
///
/// The state document is replaced wholesale on every status call, never
/// merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionRecord {
    /// Caller-supplied execution identifier.
    pub execution_id: Uuid,
    /// Identifier of the owning check.
    pub check_id: String,
    /// Opaque state produced by the check.
    pub state: OpaqueState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Construct a record for a freshly started execution.
    #[must_use]
    pub fn new(execution_id: Uuid, check_id: String, state: OpaqueState) -> Self {
        Self {
            execution_id,
            check_id,
            state,
            created_at: Utc::now(),
        }
    }

    /// Copy of this record carrying a replacement state document.
    #[must_use]
    pub fn with_state(&self, state: OpaqueState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}
