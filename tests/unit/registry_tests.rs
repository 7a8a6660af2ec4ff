//! Unit tests for check registration and descriptor defaults.

use std::time::Duration;

use preflight_kit::config::HeartbeatConfig;
use preflight_kit::models::descriptor::{
    HttpMethod, MutatingEndpointReference, MutatingEndpointReferenceWithCallInterval,
    PreflightDescription,
};
use preflight_kit::preflight::{
    BoxFuture, CancelOutcome, CancelRequest, CancellablePreflight, Preflight, PreflightResult,
    StartOutcome, StartRequest, StatusOutcome, StatusRequest,
};
use preflight_kit::registry::Registry;
use preflight_kit::AppError;

/// Check whose descriptor is supplied by the test.
struct Fixed(PreflightDescription);

fn fixed(id: &str) -> Fixed {
    Fixed(PreflightDescription {
        id: id.to_owned(),
        label: id.to_owned(),
        version: "0.0.1".to_owned(),
        ..PreflightDescription::default()
    })
}

fn with_interval(id: &str, interval: &str) -> Fixed {
    let mut check = fixed(id);
    check.0.status = MutatingEndpointReferenceWithCallInterval {
        call_interval: Some(interval.to_owned()),
        ..MutatingEndpointReferenceWithCallInterval::default()
    };
    check
}

impl Preflight for Fixed {
    type State = ();

    fn describe(&self) -> PreflightDescription {
        self.0.clone()
    }

    fn start<'a>(
        &'a self,
        _request: &'a StartRequest,
        _state: &'a mut (),
    ) -> BoxFuture<'a, PreflightResult<StartOutcome>> {
        Box::pin(async { Ok(StartOutcome::default()) })
    }

    fn status<'a>(
        &'a self,
        _request: &'a StatusRequest,
        _state: &'a mut (),
    ) -> BoxFuture<'a, PreflightResult<StatusOutcome>> {
        Box::pin(async { Ok(StatusOutcome::completed()) })
    }
}

impl CancellablePreflight for Fixed {
    fn cancel<'a>(
        &'a self,
        _request: &'a CancelRequest,
        _state: &'a mut (),
    ) -> BoxFuture<'a, PreflightResult<CancelOutcome>> {
        Box::pin(async { Ok(CancelOutcome::default()) })
    }
}

fn registry() -> Registry {
    Registry::new(&HeartbeatConfig::default())
}

#[test]
fn cancellable_registration_fills_default_paths() {
    let registry = registry();
    let descriptor = registry
        .register_cancellable(fixed("disk"))
        .expect("register");

    assert_eq!(descriptor.start.path, "/disk/start");
    assert_eq!(descriptor.start.method, HttpMethod::Post);
    assert_eq!(descriptor.status.path, "/disk/status");
    assert_eq!(descriptor.status.method, HttpMethod::Post);
    let cancel = descriptor.cancel.expect("cancel endpoint");
    assert_eq!(cancel.path, "/disk/cancel");
    assert_eq!(cancel.method, HttpMethod::Post);

    let entry = registry.lookup("disk").expect("lookup");
    assert!(entry.supports_cancel());
    assert_eq!(entry.root_endpoint().path, "/disk");
    assert_eq!(entry.root_endpoint().method, HttpMethod::Get);
}

#[test]
fn plain_registration_has_no_cancel_endpoint() {
    let registry = registry();
    let mut check = fixed("plain");
    check.0.cancel = Some(MutatingEndpointReference {
        method: HttpMethod::Delete,
        path: "/plain/abort".into(),
    });

    let descriptor = registry.register(check).expect("register");

    assert!(descriptor.cancel.is_none());
    assert!(!registry.lookup("plain").expect("lookup").supports_cancel());
}

#[test]
fn declared_paths_and_verbs_are_kept() {
    let registry = registry();
    let mut check = fixed("custom");
    check.0.start = MutatingEndpointReference {
        method: HttpMethod::Put,
        path: "/v2/custom/begin".into(),
    };

    let descriptor = registry.register_cancellable(check).expect("register");

    assert_eq!(descriptor.start.path, "/v2/custom/begin");
    assert_eq!(descriptor.start.method, HttpMethod::Put);
    assert_eq!(descriptor.status.path, "/custom/status");
}

#[test]
fn missing_interval_defaults_then_clamps_to_floor() {
    let registry = registry();
    let descriptor = registry.register(fixed("quick")).expect("register");

    assert_eq!(descriptor.status.call_interval.as_deref(), Some("5s"));
    assert_eq!(
        registry.lookup("quick").expect("lookup").poll_interval,
        Duration::from_secs(5)
    );
}

#[test]
fn short_interval_is_clamped_and_long_interval_kept() {
    let registry = registry();
    registry
        .register(with_interval("short", "1500ms"))
        .expect("register short");
    registry
        .register(with_interval("long", "12s"))
        .expect("register long");

    assert_eq!(
        registry.lookup("short").expect("short").poll_interval,
        Duration::from_secs(5)
    );
    let long = registry.lookup("long").expect("long");
    assert_eq!(long.poll_interval, Duration::from_secs(12));
    assert_eq!(long.descriptor.status.call_interval.as_deref(), Some("12s"));
}

#[test]
fn floor_follows_heartbeat_config() {
    let registry = Registry::new(&HeartbeatConfig {
        min_interval_ms: 250,
        ..HeartbeatConfig::default()
    });
    registry
        .register(with_interval("fast", "300ms"))
        .expect("register");

    assert_eq!(
        registry.lookup("fast").expect("lookup").poll_interval,
        Duration::from_millis(300)
    );
}

#[test]
fn unparsable_interval_fails_registration() {
    let registry = registry();
    let result = registry.register(with_interval("broken", "soon"));

    assert!(matches!(result, Err(AppError::Config(_))));
    assert!(registry.is_empty());
}

#[test]
fn duplicate_identifier_is_rejected() {
    let registry = registry();
    registry.register(fixed("disk")).expect("first");

    let result = registry.register_cancellable(fixed("disk"));

    assert!(matches!(result, Err(AppError::DuplicateCheck(ref id)) if id == "disk"));
    assert_eq!(registry.len(), 1);
    assert!(!registry.lookup("disk").expect("lookup").supports_cancel());
}

#[test]
fn empty_identifier_is_rejected() {
    let result = registry().register(fixed("  "));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn lookup_unknown_identifier_fails() {
    let result = registry().lookup("ghost");
    assert!(matches!(result, Err(AppError::CheckNotRegistered(ref id)) if id == "ghost"));
}

#[test]
fn list_is_sorted_by_identifier() {
    let registry = registry();
    for id in ["zeta", "alpha", "mid"] {
        registry.register(fixed(id)).expect("register");
    }

    let paths: Vec<_> = registry
        .list()
        .preflights
        .into_iter()
        .map(|endpoint| endpoint.path)
        .collect();
    assert_eq!(paths, ["/alpha", "/mid", "/zeta"]);

    let ids: Vec<_> = registry
        .entries()
        .into_iter()
        .map(|entry| entry.descriptor.id)
        .collect();
    assert_eq!(ids, ["alpha", "mid", "zeta"]);
}

#[test]
fn reset_empties_the_registry() {
    let registry = registry();
    registry.register(fixed("disk")).expect("register");

    registry.reset();

    assert!(registry.is_empty());
    registry.register(fixed("disk")).expect("re-register after reset");
}

fn with_start_path(id: &str, path: &str) -> Fixed {
    let mut check = fixed(id);
    check.0.start = MutatingEndpointReference {
        method: HttpMethod::Post,
        path: path.to_owned(),
    };
    check
}

#[test]
fn relative_path_is_rejected() {
    let registry = registry();
    let result = registry.register(with_start_path("rel", "rel/start"));

    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("must start with '/'")));
    assert!(registry.is_empty());
}

#[test]
fn templated_path_is_rejected() {
    let registry = registry();
    for path in ["/tpl/{id}", "/tpl/:id", "/tpl/*rest"] {
        let result = registry.register(with_start_path("tpl", path));
        assert!(
            matches!(result, Err(AppError::Config(ref msg)) if msg.contains("literal")),
            "{path} should be rejected, got {result:?}"
        );
    }
    assert!(registry.is_empty());
}

#[test]
fn dispatcher_paths_are_reserved() {
    let registry = registry();

    let mut status_on_health = fixed("status-on-health");
    status_on_health.0.status = MutatingEndpointReferenceWithCallInterval {
        method: HttpMethod::Get,
        path: "/health".into(),
        call_interval: None,
    };
    let result = registry.register(status_on_health);
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("reserved")));

    let result = registry.register(with_start_path("rooted", "/"));
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("reserved")));

    let result = registry.register(fixed("health"));
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("reserved")));

    assert!(registry.is_empty());
}

#[test]
fn path_repeated_within_a_check_is_rejected() {
    let registry = registry();
    let result = registry.register_cancellable(with_start_path("twice", "/twice/status"));

    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("more than one endpoint")));
    assert!(registry.is_empty());
}

#[test]
fn path_owned_by_another_check_is_rejected() {
    let registry = registry();
    registry
        .register_cancellable(fixed("disk"))
        .expect("register disk");

    let result = registry.register(with_start_path("thief", "/disk/cancel"));
    assert!(
        matches!(result, Err(AppError::Config(ref msg)) if msg.contains("already routed to check 'disk'"))
    );

    let result = registry.register(with_start_path("shadow", "/disk"));
    assert!(matches!(result, Err(AppError::Config(_))));

    assert_eq!(registry.len(), 1);
}

#[test]
fn overflowing_interval_fails_registration() {
    let registry = registry();
    let result = registry.register(with_interval("big", "400000000000000000m"));

    assert!(matches!(result, Err(AppError::Config(_))));
    assert!(registry.is_empty());
}

#[test]
fn fractional_interval_is_accepted() {
    let registry = registry();
    let descriptor = registry
        .register(with_interval("frac", "7.5s"))
        .expect("register");

    assert_eq!(descriptor.status.call_interval.as_deref(), Some("7500ms"));
    assert_eq!(
        registry.lookup("frac").expect("lookup").poll_interval,
        Duration::from_millis(7500)
    );
}
