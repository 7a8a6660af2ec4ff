//! Integration tests for heartbeat-driven auto-stop and the stop ledger
//! short-circuit.
//!
//! Timer tests run on a paused clock, so timeouts elapse instantly and
//! deterministically. The race test runs on a multi-thread runtime.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use preflight_kit::models::result::ErrorStatus;
use preflight_kit::models::stop::HEARTBEAT_TIMEOUT_REASON;
use preflight_kit::AppError;

use super::test_helpers::{self, RecordingCheck};

const STOPPED_TITLE: &str = "Preflight was stopped by extension: heartbeat timeout";

#[tokio::test(start_paused = true)]
async fn silent_execution_is_stopped_once_after_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = test_helpers::coordinator(dir.path());
    let check = RecordingCheck::new("recording");
    let calls = check.calls.clone();
    coordinator.register_cancellable(check).expect("register");
    let id = Uuid::new_v4();

    coordinator
        .start("recording", id, json!({}))
        .await
        .expect("start");

    // 5 s interval: timeout 20 s plus a 250 ms jitter allowance.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(calls.cancels(), 0, "full timeout window from arming");
    assert!(coordinator.stop_ledger().is_empty());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(calls.cancels(), 1);
    assert_eq!(
        calls.last_stop_reason.lock().unwrap().as_deref(),
        Some(HEARTBEAT_TIMEOUT_REASON)
    );
    let stop = coordinator
        .stop_ledger()
        .lookup(id)
        .expect("ledger entry");
    assert_eq!(stop.reason, HEARTBEAT_TIMEOUT_REASON);
    assert_eq!(coordinator.stop_ledger().len(), 1);
    assert!(!coordinator.heartbeats().is_armed(id));
    let err = coordinator
        .persister()
        .get(id)
        .await
        .expect_err("record removed");
    assert!(matches!(err, AppError::StateNotFound(_)));

    // Never re-fires without being re-armed.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.cancels(), 1);
    assert_eq!(coordinator.stop_ledger().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_execution_short_circuits_status_and_cancel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = test_helpers::coordinator(dir.path());
    let check = RecordingCheck::new("recording");
    let calls = check.calls.clone();
    coordinator.register_cancellable(check).expect("register");
    let id = Uuid::new_v4();

    coordinator
        .start("recording", id, json!({}))
        .await
        .expect("start");
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(calls.cancels(), 1);

    for _ in 0..5 {
        let status = coordinator
            .status("recording", id, None)
            .await
            .expect("synthetic status");
        assert!(status.completed);
        assert!(status.state.is_none());
        let error = status.error.expect("stopped error");
        assert_eq!(error.title, STOPPED_TITLE);
        assert_eq!(error.status, Some(ErrorStatus::Errored));

        let cancel = coordinator
            .cancel("recording", id, None)
            .await
            .expect("synthetic cancel");
        assert_eq!(cancel.error.expect("stopped error").title, STOPPED_TITLE);
    }

    assert_eq!(calls.statuses(), 0);
    assert_eq!(calls.cancels(), 1, "the check was reached exactly once");
}

#[tokio::test(start_paused = true)]
async fn regular_polling_keeps_execution_alive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = test_helpers::coordinator(dir.path());
    let check = RecordingCheck::new("recording");
    let calls = check.calls.clone();
    coordinator.register_cancellable(check).expect("register");
    let id = Uuid::new_v4();

    coordinator
        .start("recording", id, json!({}))
        .await
        .expect("start");

    for _ in 0..12 {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let status = coordinator
            .status("recording", id, None)
            .await
            .expect("status");
        assert!(status.error.is_none());
    }

    assert_eq!(calls.cancels(), 0);
    assert!(coordinator.stop_ledger().is_empty());
    assert!(coordinator.heartbeats().is_armed(id));
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_disarms_before_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = test_helpers::coordinator(dir.path());
    let check = RecordingCheck::new("recording");
    let calls = check.calls.clone();
    coordinator.register_cancellable(check).expect("register");
    let id = Uuid::new_v4();

    coordinator
        .start("recording", id, json!({}))
        .await
        .expect("start");
    tokio::time::sleep(Duration::from_secs(10)).await;
    coordinator
        .cancel("recording", id, None)
        .await
        .expect("cancel");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.cancels(), 1);
    assert!(coordinator.stop_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn auto_stop_of_untracked_execution_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = test_helpers::coordinator(dir.path());

    coordinator
        .auto_stop(Uuid::new_v4(), HEARTBEAT_TIMEOUT_REASON)
        .await
        .expect("nothing to stop");

    assert!(coordinator.stop_ledger().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancel_and_auto_stop_reach_the_check_once() {
    for round in 0..100 {
        let dir = tempfile::tempdir().expect("tempdir");
        let coordinator = test_helpers::coordinator(dir.path());
        let check = RecordingCheck::new("recording");
        let calls = check.calls.clone();
        coordinator.register_cancellable(check).expect("register");
        let id = Uuid::new_v4();
        coordinator
            .start("recording", id, json!({}))
            .await
            .expect("start");

        let auto = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.auto_stop(id, HEARTBEAT_TIMEOUT_REASON).await }
        });
        let explicit = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.cancel("recording", id, None).await }
        });
        auto.await.expect("join auto-stop").expect("auto-stop");
        let cancelled = explicit.await.expect("join cancel").expect("cancel");

        assert_eq!(calls.cancels(), 1, "round {round}");
        if coordinator.stop_ledger().lookup(id).is_some() {
            // Auto-stop won; the explicit Cancel is answered from the ledger.
            let error = cancelled.error.expect("stopped error");
            assert_eq!(error.title, STOPPED_TITLE, "round {round}");
            assert_eq!(error.status, Some(ErrorStatus::Errored), "round {round}");
        } else {
            assert!(cancelled.error.is_none(), "round {round}");
        }
        assert!(matches!(
            coordinator.persister().get(id).await,
            Err(AppError::StateNotFound(_))
        ));
        assert!(!coordinator.heartbeats().is_armed(id));
    }
}
