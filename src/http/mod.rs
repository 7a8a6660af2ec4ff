//! HTTP dispatcher for registered preflight checks.
//!
//! Routes are derived from the registry once, when the router is built:
//! every check contributes its discovery, start and status endpoints, and a
//! cancel endpoint only when it is cancellable. Coordinator errors are
//! answered with a [`PreflightKitError`] body.

pub mod server;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter};
use axum::{Json, Router};
use serde_json::Value;

use crate::models::descriptor::{HttpMethod, PreflightDescription, PreflightList};
use crate::models::request::{ExecutionRequestBody, StartRequestBody};
use crate::models::result::{CancelResult, PreflightKitError, StartResult, StatusResult};
use crate::orchestrator::LifecycleCoordinator;
use crate::AppError;

type Shared = Arc<LifecycleCoordinator>;

/// Error answer: an HTTP status and a structured error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: PreflightKitError,
}

impl ApiError {
    /// Wrap a coordinator error under an operation title.
    #[must_use]
    pub fn from_app(title: &str, err: &AppError) -> Self {
        let status = match err {
            AppError::CheckNotRegistered(_) | AppError::StateNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExecutionAlreadyTracked(_) | AppError::DuplicateCheck(_) => {
                StatusCode::CONFLICT
            }
            AppError::CancelNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::StateConversion(_) => StatusCode::BAD_REQUEST,
            AppError::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_)
            | AppError::Persistence(_)
            | AppError::Io(_)
            | AppError::CancellationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: PreflightKitError::failed(title, err),
        }
    }

    fn malformed(rejection: &JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: PreflightKitError::failed("Failed to parse request body.", rejection.body_text()),
        }
    }

    /// HTTP status of the answer.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the dispatcher router for every check registered so far.
///
/// Checks registered after this call are not routed. The registry rejects
/// descriptors whose paths would collide here.
#[must_use]
pub fn router(coordinator: Shared) -> Router {
    let mut router = Router::new()
        .route("/", get(list))
        .route("/health", get(health));

    for check in coordinator.registry().entries() {
        let descriptor = check.descriptor.clone();

        let id = descriptor.id.clone();
        router = router.route(
            &check.root_endpoint().path,
            get(move |State(coordinator): State<Shared>| {
                let id = id.clone();
                async move { describe(&coordinator, &id) }
            }),
        );

        let id = descriptor.id.clone();
        router = router.route(
            &descriptor.start.path,
            on(
                method_filter(descriptor.start.method),
                move |State(coordinator): State<Shared>,
                      body: Result<Json<StartRequestBody>, JsonRejection>| {
                    start(coordinator, id.clone(), body)
                },
            ),
        );

        let id = descriptor.id.clone();
        router = router.route(
            &descriptor.status.path,
            on(
                method_filter(descriptor.status.method),
                move |State(coordinator): State<Shared>,
                      body: Result<Json<ExecutionRequestBody>, JsonRejection>| {
                    status(coordinator, id.clone(), body)
                },
            ),
        );

        if let Some(cancel_endpoint) = descriptor.cancel.as_ref() {
            let id = descriptor.id.clone();
            router = router.route(
                &cancel_endpoint.path,
                on(
                    method_filter(cancel_endpoint.method),
                    move |State(coordinator): State<Shared>,
                          body: Result<Json<ExecutionRequestBody>, JsonRejection>| {
                        cancel(coordinator, id.clone(), body)
                    },
                ),
            );
        }
    }

    router.with_state(coordinator)
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

async fn list(State(coordinator): State<Shared>) -> Json<PreflightList> {
    Json(coordinator.list())
}

fn describe(
    coordinator: &LifecycleCoordinator,
    check_id: &str,
) -> Result<Json<PreflightDescription>, ApiError> {
    coordinator
        .describe(check_id)
        .map(Json)
        .map_err(|err| ApiError::from_app("Failed to describe preflight.", &err))
}

async fn start(
    coordinator: Shared,
    check_id: String,
    body: Result<Json<StartRequestBody>, JsonRejection>,
) -> Result<Json<StartResult>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::malformed(&rejection))?;
    coordinator
        .start(&check_id, body.execution_id, Value::Object(body.payload))
        .await
        .map(Json)
        .map_err(|err| ApiError::from_app("Failed to start preflight.", &err))
}

async fn status(
    coordinator: Shared,
    check_id: String,
    body: Result<Json<ExecutionRequestBody>, JsonRejection>,
) -> Result<Json<StatusResult>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::malformed(&rejection))?;
    coordinator
        .status(&check_id, body.execution_id, body.state)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_app("Failed to read status.", &err))
}

async fn cancel(
    coordinator: Shared,
    check_id: String,
    body: Result<Json<ExecutionRequestBody>, JsonRejection>,
) -> Result<Json<CancelResult>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::malformed(&rejection))?;
    coordinator
        .cancel(&check_id, body.execution_id, body.state)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_app("Failed to cancel preflight.", &err))
}
