//! Volatile in-process state store.

use std::collections::HashMap;
use std::future::ready;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::models::execution::ExecutionRecord;
use crate::preflight::BoxFuture;
use crate::{AppError, Result};

use super::StatePersister;

/// Lock-guarded map of execution records.
///
/// Critical sections never span an `.await`, so a blocking `RwLock` is
/// sufficient.
#[derive(Default)]
pub struct InMemoryStatePersister {
    states: RwLock<HashMap<Uuid, ExecutionRecord>>,
}

impl InMemoryStatePersister {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no records are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatePersister for InMemoryStatePersister {
    fn persist<'a>(&'a self, record: &'a ExecutionRecord) -> BoxFuture<'a, Result<()>> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.execution_id, record.clone());
        Box::pin(ready(Ok(())))
    }

    fn get(&self, execution_id: Uuid) -> BoxFuture<'_, Result<ExecutionRecord>> {
        let found = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&execution_id)
            .cloned()
            .ok_or_else(|| AppError::StateNotFound(format!("execution {execution_id}")));
        Box::pin(ready(found))
    }

    fn list_ids(&self) -> BoxFuture<'_, Result<Vec<Uuid>>> {
        let ids = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        Box::pin(ready(Ok(ids)))
    }

    fn delete(&self, execution_id: Uuid) -> BoxFuture<'_, Result<()>> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&execution_id);
        Box::pin(ready(Ok(())))
    }
}
