//! Bounded history of executions stopped by the engine.
//!
//! A hit in the ledger is authoritative: Status and Cancel for that
//! execution answer with a synthetic "stopped" result and never reach the
//! check again.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::models::stop::StopRecord;

/// Default number of retained stop records.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO of [`StopRecord`]s.
pub struct StopLedger {
    capacity: usize,
    records: RwLock<VecDeque<StopRecord>>,
}

impl Default for StopLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StopLedger {
    /// Create an empty ledger; a zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a stop record, evicting the oldest once over capacity.
    pub fn record(&self, execution_id: Uuid, reason: impl Into<String>) {
        let record = StopRecord::new(execution_id, reason);
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Most recent stop record for an execution, if any.
    #[must_use]
    pub fn lookup(&self, execution_id: Uuid) -> Option<StopRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|record| record.execution_id == execution_id)
            .cloned()
    }

    /// Snapshot of all records, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<StopRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
