//! Request bodies accepted by the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::execution::OpaqueState;

/// Body of a Start call.
///
/// Every field other than the execution identifier is forwarded to the check
/// as the opaque initial request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartRequestBody {
    /// Caller-supplied execution identifier.
    pub execution_id: Uuid,
    /// Remaining request document.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Body of a Status or Cancel call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequestBody {
    /// Execution identifier returned to the caller at start.
    pub execution_id: Uuid,
    /// State echoed back by a stateless caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OpaqueState>,
}
