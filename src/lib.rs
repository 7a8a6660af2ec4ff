#![forbid(unsafe_code)]

//! Lifecycle engine for asynchronous preflight checks.
//!
//! A process registers checks with a [`LifecycleCoordinator`], which tracks
//! every execution from Start through Status polls to Cancel, arms a
//! heartbeat watchdog per cancellable execution, and stops abandoned
//! executions on its own.

pub mod checks;
pub mod codec;
pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod preflight;
pub mod registry;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use orchestrator::LifecycleCoordinator;
