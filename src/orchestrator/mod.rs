//! Execution orchestration.
//!
//! Covers the lifecycle coordinator, heartbeat watchdogs, the stop ledger,
//! per-execution locking, and the shutdown sweep.

pub mod coordinator;
pub mod execution_locks;
pub mod heartbeat_monitor;
pub mod shutdown;
pub mod stop_ledger;

pub use coordinator::{LifecycleCoordinator, ShutdownSummary};
