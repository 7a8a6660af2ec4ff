//! Per-execution heartbeat watchdogs.
//!
//! Each armed execution gets one background task that wakes on an extended
//! poll cadence and checks when the orchestrator last polled. If no liveness
//! signal arrives for a full timeout window, the task removes itself from
//! the table, fires its timeout callback exactly once, and exits.
//!
//! Timing for a poll interval `i` (floor-clamped):
//!
//! - `timeout = i × multiplier`
//! - `grace = min(i × 5 %, max_jitter)`, absorbing polls that narrowly miss
//!   the interval
//! - the task wakes every `i + grace` and fires once `timeout + grace` has
//!   elapsed since the last signal (or since arming)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::HeartbeatConfig;
use crate::preflight::BoxFuture;

/// Callback fired when an execution's heartbeat times out.
pub type TimeoutCallback = Arc<dyn Fn(Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

/// Resolved watchdog timing for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatTiming {
    /// Floor-clamped poll interval.
    pub interval: Duration,
    /// Allowance added to the interval for network and processing jitter.
    pub grace: Duration,
    /// Liveness window without a signal before the callback fires.
    pub timeout: Duration,
}

impl HeartbeatTiming {
    /// Derive timing for a declared poll interval.
    #[must_use]
    pub fn resolve(config: &HeartbeatConfig, interval: Duration) -> Self {
        let interval = interval.max(config.min_interval());
        let grace = (interval / 20).min(config.max_jitter());
        let timeout = interval.saturating_mul(config.timeout_multiplier);
        Self {
            interval,
            grace,
            timeout,
        }
    }

    /// Cadence on which the watchdog checks liveness.
    #[must_use]
    pub fn extended_interval(&self) -> Duration {
        self.interval.saturating_add(self.grace)
    }
}

/// Point-in-time view of an armed watchdog.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSnapshot {
    /// Watched execution.
    pub execution_id: Uuid,
    /// Last liveness signal, or the arming time if none arrived yet.
    pub last_liveness: Instant,
    /// Watchdog timing.
    pub timing: HeartbeatTiming,
    /// Whether the watchdog task is still watching.
    pub running: bool,
}

/// One armed watchdog. Dropping the entry cancels its task.
struct HeartbeatEntry {
    execution_id: Uuid,
    last_liveness: Arc<Mutex<Instant>>,
    timing: HeartbeatTiming,
    running: Arc<AtomicBool>,
    generation: u64,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl Drop for HeartbeatEntry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type EntryTable = Arc<Mutex<HashMap<Uuid, HeartbeatEntry>>>;

/// Table of heartbeat watchdogs keyed by execution identifier.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    entries: EntryTable,
    next_generation: AtomicU64,
}

impl HeartbeatMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Arm a watchdog for an execution, replacing any existing one.
    ///
    /// The full timeout window is guaranteed from the moment of arming.
    /// Must be called from within a Tokio runtime.
    pub fn arm(
        &self,
        execution_id: Uuid,
        interval: Duration,
        on_timeout: TimeoutCallback,
    ) {
        let timing = HeartbeatTiming::resolve(&self.config, interval);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let last_liveness = Arc::new(Mutex::new(Instant::now()));
        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let task = tokio::spawn(
            watch(
                execution_id,
                timing,
                Arc::clone(&last_liveness),
                Arc::clone(&running),
                cancel.clone(),
                Arc::clone(&self.entries),
                generation,
                on_timeout,
            )
            .instrument(info_span!("heartbeat_monitor", execution_id = %execution_id)),
        );

        let replaced = entries.insert(
            execution_id,
            HeartbeatEntry {
                execution_id,
                last_liveness,
                timing,
                running,
                generation,
                cancel,
                _task: task,
            },
        );
        drop(entries);

        if replaced.is_some() {
            debug!(execution_id = %execution_id, "heartbeat watchdog re-armed");
        } else {
            debug!(
                execution_id = %execution_id,
                interval_ms = millis(timing.interval),
                timeout_ms = millis(timing.timeout),
                "heartbeat watchdog armed"
            );
        }
    }

    /// Record a liveness signal; returns whether the execution was armed.
    pub fn record(&self, execution_id: Uuid) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&execution_id) {
            Some(entry) => {
                *entry
                    .last_liveness
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Disarm an execution's watchdog; a no-op when not armed.
    ///
    /// Returns whether a watchdog was removed.
    pub fn stop(&self, execution_id: Uuid) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&execution_id);
        if removed.is_some() {
            debug!(execution_id = %execution_id, "heartbeat watchdog disarmed");
        }
        removed.is_some()
    }

    /// Disarm every watchdog.
    pub fn stop_all(&self) {
        let drained: Vec<HeartbeatEntry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        drop(drained);
    }

    /// Whether an execution currently has a watchdog.
    #[must_use]
    pub fn is_armed(&self, execution_id: Uuid) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&execution_id)
    }

    /// Number of armed watchdogs.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Inspect an armed watchdog.
    #[must_use]
    pub fn snapshot(&self, execution_id: Uuid) -> Option<HeartbeatSnapshot> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(&execution_id).map(|entry| HeartbeatSnapshot {
            execution_id: entry.execution_id,
            last_liveness: *entry
                .last_liveness
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            timing: entry.timing,
            running: entry.running.load(Ordering::SeqCst),
        })
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Watchdog loop for a single execution.
#[allow(clippy::too_many_arguments)] // Entry parts are shared with the table, not bundled.
async fn watch(
    execution_id: Uuid,
    timing: HeartbeatTiming,
    last_liveness: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    entries: EntryTable,
    generation: u64,
    on_timeout: TimeoutCallback,
) {
    loop {
        let last = *last_liveness.lock().unwrap_or_else(PoisonError::into_inner);
        // `None` means the deadline lies beyond the clock's range.
        let deadline = last.checked_add(timing.timeout.saturating_add(timing.grace));
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            break;
        }

        let wake = match (deadline, now.checked_add(timing.extended_interval())) {
            (Some(deadline), Some(next)) => Some(deadline.min(next)),
            (deadline, next) => deadline.or(next),
        };
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(execution_id = %execution_id, "heartbeat watchdog cancelled");
                return;
            }
            () = sleep_until_or_forever(wake) => {}
        }
    }

    // Leave the table before firing. A missing or newer entry means the
    // watchdog was disarmed or re-armed while it was deciding to fire.
    let own = {
        let mut table = entries.lock().unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&execution_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            table.remove(&execution_id)
        } else {
            None
        }
    };
    let Some(own) = own else {
        debug!(execution_id = %execution_id, "heartbeat watchdog superseded before firing");
        return;
    };
    running.store(false, Ordering::SeqCst);
    drop(own);

    warn!(
        execution_id = %execution_id,
        timeout_ms = millis(timing.timeout),
        "heartbeat timed out"
    );
    on_timeout(execution_id).await;
}

async fn sleep_until_or_forever(wake: Option<Instant>) {
    match wake {
        Some(wake) => tokio::time::sleep_until(wake).await,
        None => std::future::pending().await,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
