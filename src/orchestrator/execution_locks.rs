//! Per-execution mutual exclusion.
//!
//! Start, Status, Cancel and auto-stop for the same execution run one at a
//! time, so a heartbeat timeout can never interleave with an orchestrator
//! call for that execution. Different executions never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

/// Lazily populated table of per-execution locks.
#[derive(Default)]
pub struct ExecutionLocks {
    locks: LockTable,
}

/// Exclusive hold on one execution. Releasing the last hold prunes the
/// table entry.
pub struct ExecutionGuard {
    execution_id: Uuid,
    locks: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ExecutionLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to an execution.
    pub async fn acquire(&self, execution_id: Uuid) -> ExecutionGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(execution_id).or_default())
        };
        let guard = lock.lock_owned().await;
        ExecutionGuard {
            execution_id,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of executions with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no execution is currently locked or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only waiters.
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.execution_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.execution_id);
        }
    }
}
