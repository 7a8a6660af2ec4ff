//! Registry of preflight checks and their resolved descriptors.
//!
//! Registration is expected during process startup only. Lookups are cheap
//! clones of `Arc`s, so steady-state traffic never holds the lock across a
//! plugin call.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::info;

use crate::config::HeartbeatConfig;
use crate::models::descriptor::{
    format_interval, parse_interval, DescribingEndpointReference, HttpMethod,
    PreflightDescription, PreflightList,
};
use crate::preflight::adapter::{Cancellable, Plain};
use crate::preflight::{CancellablePreflight, DynPreflight, Preflight};
use crate::{AppError, Result};

/// Paths served by the dispatcher itself.
pub const RESERVED_PATHS: [&str; 2] = ["/", "/health"];

/// Poll interval assumed when a check does not declare one.
pub const DEFAULT_CALL_INTERVAL: Duration = Duration::from_secs(1);

/// A registered check: its resolved descriptor and implementation.
#[derive(Clone)]
pub struct RegisteredPreflight {
    /// Descriptor with defaults applied.
    pub descriptor: PreflightDescription,
    /// Resolved, floor-clamped status poll interval.
    pub poll_interval: Duration,
    /// Type-erased implementation.
    pub implementation: Arc<dyn DynPreflight>,
}

impl RegisteredPreflight {
    /// Whether the check exposes a cancel operation.
    #[must_use]
    pub fn supports_cancel(&self) -> bool {
        self.implementation.supports_cancel()
    }

    /// Discovery endpoint of this check.
    #[must_use]
    pub fn root_endpoint(&self) -> DescribingEndpointReference {
        DescribingEndpointReference {
            method: HttpMethod::Get,
            path: root_path(&self.descriptor.id),
        }
    }

    /// Every path the dispatcher routes to this check.
    #[must_use]
    pub fn routed_paths(&self) -> Vec<String> {
        routed_paths(&self.descriptor)
    }
}

impl std::fmt::Debug for RegisteredPreflight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPreflight")
            .field("descriptor", &self.descriptor)
            .field("poll_interval", &self.poll_interval)
            .field("supports_cancel", &self.supports_cancel())
            .finish_non_exhaustive()
    }
}

/// Maps check identifiers to implementations.
pub struct Registry {
    min_interval: Duration,
    checks: RwLock<HashMap<String, RegisteredPreflight>>,
}

impl Registry {
    /// Create an empty registry applying the heartbeat interval floor.
    #[must_use]
    pub fn new(heartbeat: &HeartbeatConfig) -> Self {
        Self {
            min_interval: heartbeat.min_interval(),
            checks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a check without cancel capability.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DuplicateCheck` if the identifier is taken, or
    /// `AppError::Config` if the descriptor is invalid.
    pub fn register<P: Preflight>(&self, check: P) -> Result<PreflightDescription> {
        let described = check.describe();
        self.insert(described, Arc::new(Plain(check)))
    }

    /// Register a check with cancel capability.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DuplicateCheck` if the identifier is taken, or
    /// `AppError::Config` if the descriptor is invalid.
    pub fn register_cancellable<P: CancellablePreflight>(
        &self,
        check: P,
    ) -> Result<PreflightDescription> {
        let described = check.describe();
        self.insert(described, Arc::new(Cancellable(check)))
    }

    fn insert(
        &self,
        described: PreflightDescription,
        implementation: Arc<dyn DynPreflight>,
    ) -> Result<PreflightDescription> {
        if described.id.trim().is_empty() {
            return Err(AppError::Config("check id must not be empty".into()));
        }

        let (descriptor, poll_interval) =
            with_defaults(described, implementation.supports_cancel(), self.min_interval)?;

        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        if checks.contains_key(&descriptor.id) {
            return Err(AppError::DuplicateCheck(descriptor.id));
        }
        for path in routed_paths(&descriptor) {
            if let Some(owner) = checks
                .values()
                .find(|other| other.routed_paths().contains(&path))
            {
                return Err(AppError::Config(format!(
                    "check '{}': path '{path}' is already routed to check '{}'",
                    descriptor.id, owner.descriptor.id
                )));
            }
        }

        info!(
            check_id = %descriptor.id,
            cancellable = implementation.supports_cancel(),
            poll_interval_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            "preflight registered"
        );

        checks.insert(
            descriptor.id.clone(),
            RegisteredPreflight {
                descriptor: descriptor.clone(),
                poll_interval,
                implementation,
            },
        );
        Ok(descriptor)
    }

    /// Look up a registered check.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckNotRegistered` if the identifier is unknown.
    pub fn lookup(&self, check_id: &str) -> Result<RegisteredPreflight> {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(check_id)
            .cloned()
            .ok_or_else(|| AppError::CheckNotRegistered(check_id.to_owned()))
    }

    /// Discovery endpoints of all registered checks, ordered by identifier.
    #[must_use]
    pub fn list(&self) -> PreflightList {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        let mut preflights: Vec<_> = checks
            .values()
            .map(RegisteredPreflight::root_endpoint)
            .collect();
        preflights.sort_by(|a, b| a.path.cmp(&b.path));
        PreflightList { preflights }
    }

    /// All registered checks, ordered by identifier.
    #[must_use]
    pub fn entries(&self) -> Vec<RegisteredPreflight> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = checks.values().cloned().collect();
        entries.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        entries
    }

    /// Number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no checks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registered check.
    pub fn reset(&self) {
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Fill in default paths, verbs, and poll interval.
///
/// Returns the completed descriptor and the floor-clamped poll interval.
fn with_defaults(
    mut description: PreflightDescription,
    cancellable: bool,
    min_interval: Duration,
) -> Result<(PreflightDescription, Duration)> {
    let id = description.id.clone();

    if description.start.path.is_empty() {
        description.start.path = format!("/{id}/start");
    }

    if description.status.path.is_empty() {
        description.status.path = format!("/{id}/status");
    }

    description.cancel = if cancellable {
        let mut cancel = description.cancel.take().unwrap_or_default();
        if cancel.path.is_empty() {
            cancel.path = format!("/{id}/cancel");
        }
        Some(cancel)
    } else {
        None
    };

    validate_paths(&description)?;

    let declared = match description.status.call_interval.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_interval(raw)?,
        _ => DEFAULT_CALL_INTERVAL,
    };
    let poll_interval = declared.max(min_interval);
    description.status.call_interval = Some(format_interval(poll_interval));

    Ok((description, poll_interval))
}

fn root_path(id: &str) -> String {
    format!("/{id}")
}

fn routed_paths(description: &PreflightDescription) -> Vec<String> {
    let mut paths = vec![
        root_path(&description.id),
        description.start.path.clone(),
        description.status.path.clone(),
    ];
    if let Some(cancel) = &description.cancel {
        paths.push(cancel.path.clone());
    }
    paths
}

/// Reject paths the dispatcher could not route: relative or templated
/// paths, the dispatcher's own paths, and paths repeated within one check.
fn validate_paths(description: &PreflightDescription) -> Result<()> {
    let id = &description.id;
    let paths = routed_paths(description);
    for (index, path) in paths.iter().enumerate() {
        if !path.starts_with('/') {
            return Err(AppError::Config(format!(
                "check '{id}': path '{path}' must start with '/'"
            )));
        }
        if path.contains(['{', '}', '*', ':']) {
            return Err(AppError::Config(format!(
                "check '{id}': path '{path}' must be a literal path"
            )));
        }
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(AppError::Config(format!(
                "check '{id}': path '{path}' is reserved by the dispatcher"
            )));
        }
        if paths[..index].contains(path) {
            return Err(AppError::Config(format!(
                "check '{id}': path '{path}' is used by more than one endpoint"
            )));
        }
    }
    Ok(())
}
