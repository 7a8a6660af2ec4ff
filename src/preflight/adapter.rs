//! Type-erased view of a registered check.
//!
//! The registry stores checks of different state types side by side, so each
//! is wrapped in an adapter that speaks opaque state and performs the typed
//! conversion through [`codec`](crate::codec).

use crate::codec;
use crate::models::execution::OpaqueState;
use crate::Result;

use super::{
    BoxFuture, CancelOutcome, CancelRequest, CancellablePreflight, Preflight, PreflightResult,
    StartOutcome, StartRequest, StatusOutcome, StatusRequest,
};

/// Outcome of one plugin call together with the state it left behind.
#[derive(Debug, Clone)]
pub struct Invocation<T> {
    /// State after the call, in opaque form.
    pub state: OpaqueState,
    /// What the plugin reported.
    pub outcome: PreflightResult<T>,
}

/// Object-safe lifecycle surface of a registered check.
///
/// The outer `Result` carries engine failures (state conversion); plugin
/// failures travel inside [`Invocation::outcome`].
pub trait DynPreflight: Send + Sync {
    /// Whether the check exposes a cancel operation.
    fn supports_cancel(&self) -> bool;

    /// Run Start against a freshly defaulted state.
    fn start<'a>(
        &'a self,
        request: &'a StartRequest,
    ) -> BoxFuture<'a, Result<Invocation<StartOutcome>>>;

    /// Run Status against the given state.
    fn status<'a>(
        &'a self,
        request: &'a StatusRequest,
        state: OpaqueState,
    ) -> BoxFuture<'a, Result<Invocation<StatusOutcome>>>;

    /// Run Cancel against the given state; `None` when not cancellable.
    fn cancel<'a>(
        &'a self,
        request: &'a CancelRequest,
        state: OpaqueState,
    ) -> Option<BoxFuture<'a, Result<Invocation<CancelOutcome>>>>;
}

/// Adapter for a check without cancel capability.
pub(crate) struct Plain<P>(pub(crate) P);

/// Adapter for a check with cancel capability.
pub(crate) struct Cancellable<P>(pub(crate) P);

async fn run_start<P: Preflight>(
    check: &P,
    request: &StartRequest,
) -> Result<Invocation<StartOutcome>> {
    let mut state = P::State::default();
    let outcome = check.start(request, &mut state).await;
    Ok(Invocation {
        state: codec::to_opaque(&state)?,
        outcome,
    })
}

async fn run_status<P: Preflight>(
    check: &P,
    request: &StatusRequest,
    state: OpaqueState,
) -> Result<Invocation<StatusOutcome>> {
    let mut state: P::State = codec::from_opaque(state)?;
    let outcome = check.status(request, &mut state).await;
    Ok(Invocation {
        state: codec::to_opaque(&state)?,
        outcome,
    })
}

async fn run_cancel<P: CancellablePreflight>(
    check: &P,
    request: &CancelRequest,
    state: OpaqueState,
) -> Result<Invocation<CancelOutcome>> {
    let mut state: P::State = codec::from_opaque(state)?;
    let outcome = check.cancel(request, &mut state).await;
    Ok(Invocation {
        state: codec::to_opaque(&state)?,
        outcome,
    })
}

impl<P: Preflight> DynPreflight for Plain<P> {
    fn supports_cancel(&self) -> bool {
        false
    }

    fn start<'a>(
        &'a self,
        request: &'a StartRequest,
    ) -> BoxFuture<'a, Result<Invocation<StartOutcome>>> {
        Box::pin(run_start(&self.0, request))
    }

    fn status<'a>(
        &'a self,
        request: &'a StatusRequest,
        state: OpaqueState,
    ) -> BoxFuture<'a, Result<Invocation<StatusOutcome>>> {
        Box::pin(run_status(&self.0, request, state))
    }

    fn cancel<'a>(
        &'a self,
        _request: &'a CancelRequest,
        _state: OpaqueState,
    ) -> Option<BoxFuture<'a, Result<Invocation<CancelOutcome>>>> {
        None
    }
}

impl<P: CancellablePreflight> DynPreflight for Cancellable<P> {
    fn supports_cancel(&self) -> bool {
        true
    }

    fn start<'a>(
        &'a self,
        request: &'a StartRequest,
    ) -> BoxFuture<'a, Result<Invocation<StartOutcome>>> {
        Box::pin(run_start(&self.0, request))
    }

    fn status<'a>(
        &'a self,
        request: &'a StatusRequest,
        state: OpaqueState,
    ) -> BoxFuture<'a, Result<Invocation<StatusOutcome>>> {
        Box::pin(run_status(&self.0, request, state))
    }

    fn cancel<'a>(
        &'a self,
        request: &'a CancelRequest,
        state: OpaqueState,
    ) -> Option<BoxFuture<'a, Result<Invocation<CancelOutcome>>>> {
        Some(Box::pin(run_cancel(&self.0, request, state)))
    }
}
