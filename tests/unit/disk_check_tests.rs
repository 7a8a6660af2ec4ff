//! Unit tests for the bundled `disk-check`, driven directly through its
//! plugin interface.

use serde_json::json;
use uuid::Uuid;

use preflight_kit::checks::disk_check::{DiskCheckState, DiskCheckStep, DISK_CHECK_ID};
use preflight_kit::checks::DiskCheck;
use preflight_kit::models::result::ErrorStatus;
use preflight_kit::preflight::{
    CancelRequest, CancellablePreflight, Preflight, StartRequest, StatusRequest,
};

fn requests(root: &std::path::Path) -> (StartRequest, StatusRequest, CancelRequest) {
    let execution_id = Uuid::new_v4();
    let work_dir = root.join(execution_id.to_string());
    (
        StartRequest {
            execution_id,
            check_id: DISK_CHECK_ID.to_owned(),
            payload: json!({}),
            work_dir: work_dir.clone(),
        },
        StatusRequest {
            execution_id,
            check_id: DISK_CHECK_ID.to_owned(),
            work_dir: work_dir.clone(),
        },
        CancelRequest {
            execution_id,
            check_id: DISK_CHECK_ID.to_owned(),
            work_dir,
            stop_reason: None,
        },
    )
}

#[test]
fn describes_itself_with_a_five_second_poll() {
    let descriptor = DiskCheck.describe();
    assert_eq!(descriptor.id, "disk-check");
    assert_eq!(descriptor.status.call_interval.as_deref(), Some("5s"));
    assert!(!descriptor.version.is_empty());
}

#[tokio::test]
async fn steps_advance_from_init_to_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (start, status, _) = requests(dir.path());
    let mut state = DiskCheckState::default();

    DiskCheck.start(&start, &mut state).await.expect("start");
    assert_eq!(state.step, DiskCheckStep::Init);
    assert!(start.work_dir.is_dir());

    let first = DiskCheck.status(&status, &mut state).await.expect("poll");
    assert!(!first.completed);
    assert_eq!(state.step, DiskCheckStep::Checking);
    let probe = state.probe_file.clone().expect("probe recorded");
    assert!(std::path::Path::new(&probe).is_file());

    let second = DiskCheck.status(&status, &mut state).await.expect("poll");
    assert!(second.completed);
    assert_eq!(state.step, DiskCheckStep::Done);
}

#[tokio::test]
async fn cancelled_check_reports_errored_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (start, status, cancel) = requests(dir.path());
    let mut state = DiskCheckState::default();

    DiskCheck.start(&start, &mut state).await.expect("start");
    DiskCheck.cancel(&cancel, &mut state).await.expect("cancel");
    assert_eq!(state.step, DiskCheckStep::Cancelled);

    let outcome = DiskCheck.status(&status, &mut state).await.expect("poll");
    assert!(outcome.completed);
    assert_eq!(
        outcome.error.expect("error").status,
        Some(ErrorStatus::Errored)
    );
}

#[test]
fn state_wire_form_is_camel_case() {
    let state = DiskCheckState {
        step: DiskCheckStep::Checking,
        probe_file: Some("/tmp/x/probe".into()),
    };
    assert_eq!(
        serde_json::to_value(&state).expect("encode"),
        json!({ "step": "checking", "probeFile": "/tmp/x/probe" })
    );
    assert_eq!(
        serde_json::to_value(DiskCheckState::default()).expect("encode"),
        json!({ "step": "init" })
    );
}
