//! Execution state persistence.
//!
//! [`StatePersister`] is the keyed store behind the coordinator. Two
//! backends ship with the crate: [`memory::InMemoryStatePersister`] for
//! volatile single-process use and [`state_repo::SqliteStatePersister`] for
//! a `SQLite` file that survives restarts.

pub mod db;
pub mod memory;
pub mod schema;
pub mod state_repo;

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{GlobalConfig, PersistenceBackend};
use crate::models::execution::ExecutionRecord;
use crate::preflight::BoxFuture;
use crate::{AppError, Result};

/// Keyed store of per-execution state.
///
/// Implementations must be safe to share across tasks. Operations on the
/// same execution identifier are sequentially consistent: a `persist` is
/// visible to every later `get` for that identifier.
pub trait StatePersister: Send + Sync {
    /// Insert or wholesale-replace the record for its execution identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the write fails.
    fn persist<'a>(&'a self, record: &'a ExecutionRecord) -> BoxFuture<'a, Result<()>>;

    /// Load the record of an execution.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StateNotFound` if no record exists, or
    /// `AppError::Persistence` if the read fails.
    fn get(&self, execution_id: Uuid) -> BoxFuture<'_, Result<ExecutionRecord>>;

    /// Identifiers of all tracked executions, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the read fails.
    fn list_ids(&self) -> BoxFuture<'_, Result<Vec<Uuid>>>;

    /// Remove the record of an execution; removing an absent record is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the write fails.
    fn delete(&self, execution_id: Uuid) -> BoxFuture<'_, Result<()>>;
}

/// Build the persister selected by `config.persistence`.
///
/// # Errors
///
/// Returns `AppError::Config` if the `sqlite` backend has no path, or
/// `AppError::Persistence` if the database cannot be opened.
pub async fn from_config(config: &GlobalConfig) -> Result<Arc<dyn StatePersister>> {
    match config.persistence.backend {
        PersistenceBackend::Memory => Ok(Arc::new(memory::InMemoryStatePersister::new())),
        PersistenceBackend::Sqlite => {
            let path = config.persistence.db_path.as_ref().ok_or_else(|| {
                AppError::Config("persistence.db_path is required for the sqlite backend".into())
            })?;
            let pool = db::connect(path).await?;
            Ok(Arc::new(state_repo::SqliteStatePersister::new(Arc::new(
                pool,
            ))))
        }
    }
}
