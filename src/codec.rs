//! Conversion between a check's typed state and the opaque wire document.
//!
//! Conversion is schema-driven through the state type's `serde`
//! implementation; a structural mismatch is reported as
//! [`AppError::StateConversion`] rather than a panic.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::execution::OpaqueState;
use crate::{AppError, Result};

/// Serialize typed state into its opaque form.
///
/// # Errors
///
/// Returns `AppError::StateConversion` if the state cannot be represented as
/// a JSON document (for example a map with non-string keys).
pub fn to_opaque<T: Serialize>(state: &T) -> Result<OpaqueState> {
    serde_json::to_value(state)
        .map_err(|err| AppError::StateConversion(format!("cannot encode state: {err}")))
}

/// Deserialize an opaque document into typed state.
///
/// A `null` document yields the type's default, which is what a check sees
/// when the caller echoes back no state at all.
///
/// # Errors
///
/// Returns `AppError::StateConversion` if the document does not match the
/// shape of `T`.
pub fn from_opaque<T: DeserializeOwned + Default>(state: OpaqueState) -> Result<T> {
    if state.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(state)
        .map_err(|err| AppError::StateConversion(format!("cannot decode state: {err}")))
}
