//! Error types shared across the engine.

use std::fmt::{Display, Formatter};

/// Shared engine result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Engine error enumeration covering coordinator, registry, and storage failures.
///
/// Plugin-reported business failures are not represented here; they travel
/// as [`PreflightKitError`](crate::models::result::PreflightKitError) payloads
/// inside lifecycle results.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// State store read or write failure.
    Persistence(String),
    /// File-system or socket I/O failure.
    Io(String),
    /// No check is registered under the requested identifier.
    CheckNotRegistered(String),
    /// A check with the same identifier is already registered.
    DuplicateCheck(String),
    /// No tracked execution state exists for the identifier.
    StateNotFound(String),
    /// Opaque state does not match the check's typed state.
    StateConversion(String),
    /// Start was called for an execution that is still tracked.
    ExecutionAlreadyTracked(String),
    /// Cancel was requested for a check without cancel capability.
    CancelNotSupported(String),
    /// The plugin's cancel operation failed during an engine-initiated stop.
    CancellationFailed(String),
    /// The process is shutting down and accepts no new executions.
    ShuttingDown(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Persistence(msg) => write!(f, "persistence: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::CheckNotRegistered(msg) => write!(f, "check not registered: {msg}"),
            Self::DuplicateCheck(msg) => write!(f, "duplicate check: {msg}"),
            Self::StateNotFound(msg) => write!(f, "state not found: {msg}"),
            Self::StateConversion(msg) => write!(f, "state conversion: {msg}"),
            Self::ExecutionAlreadyTracked(msg) => write!(f, "execution already tracked: {msg}"),
            Self::CancelNotSupported(msg) => write!(f, "cancel not supported: {msg}"),
            Self::CancellationFailed(msg) => write!(f, "cancellation failed: {msg}"),
            Self::ShuttingDown(msg) => write!(f, "shutting down: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
