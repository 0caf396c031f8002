//! Route table and HTTP handlers.
//!
//! Status mapping: requests rejected before a sandbox (validation, capacity)
//! get 4xx; infrastructure faults get 500; everything the submitted code did
//! to itself is a 200 with the outcome inside the envelope.

use crate::history::HistoryStore;
use crate::normalize::normalize;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use seek_common::{
    ExecError, ExecuteRequest, ExecuteResponse, ExecutionRecord, Outcome, ValidateData,
    ValidateRequest, ValidateResponse,
};
use seek_sandbox::ExecutionService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared state for all gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub service: ExecutionService,
    pub history: Arc<HistoryStore>,
}

impl GatewayState {
    pub fn new(service: ExecutionService, history: Arc<HistoryStore>) -> Self {
        Self { service, history }
    }
}

/// Build the gateway router. The same API surface is mounted unversioned and
/// under `/api/v1`, which the frontend already targets interchangeably.
pub fn create_router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/code/execute", post(handle_execute))
        .route("/code/validate", post(handle_validate))
        .route("/code/history", get(handle_history))
        .route("/code/stats", get(handle_stats));

    Router::new()
        .nest("/api", api.clone())
        .nest("/api/v1", api)
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the gateway until the shutdown token fires.
pub async fn start_server(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(state);
    let bind_addr = listener
        .local_addr()
        .context("failed to obtain gateway bind address")?;
    info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("gateway server error")?;

    Ok(())
}

async fn handle_execute(
    State(state): State<GatewayState>,
    Json(request): Json<ExecuteRequest>,
) -> (StatusCode, Json<ExecuteResponse>) {
    // A dropped connection drops this future, which cancels the execution
    // through the sandbox teardown; the token stays unfired in normal flow.
    let cancel = CancellationToken::new();
    match state.service.execute(&request, &cancel).await {
        Ok(report) => {
            let status = if report.result.outcome == Outcome::InfraFailure {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, Json(normalize(&report)))
        }
        Err(e) => error_response(e),
    }
}

async fn handle_validate(
    State(state): State<GatewayState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, (StatusCode, Json<ExecuteResponse>)> {
    let cancel = CancellationToken::new();
    let report = state
        .service
        .check_syntax(&request, &cancel)
        .await
        .map_err(error_response)?;
    Ok(Json(ValidateResponse {
        success: true,
        data: ValidateData {
            valid: report.valid,
            errors: report.errors,
        },
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    success: bool,
    data: Vec<ExecutionRecord>,
}

async fn handle_history(
    State(state): State<GatewayState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let limit = query.limit.unwrap_or(50).min(500);
    Json(HistoryResponse {
        success: true,
        data: state.history.recent(limit).await,
    })
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    data: crate::history::StatsData,
}

async fn handle_stats(State(state): State<GatewayState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        data: state.history.stats().await,
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(rename = "activeSandboxes")]
    active_sandboxes: usize,
    #[serde(rename = "availableSlots")]
    available_slots: usize,
    #[serde(rename = "queueLength")]
    queue_length: usize,
    languages: Vec<String>,
}

async fn handle_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sandboxes: state.service.active_sandboxes(),
        available_slots: state.service.queue().available_slots(),
        queue_length: state.service.queue().queue_len(),
        languages: state.service.registry().ids(),
    })
}

fn error_response(error: ExecError) -> (StatusCode, Json<ExecuteResponse>) {
    let (status, kind) = match &error {
        ExecError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        ExecError::Capacity => (StatusCode::TOO_MANY_REQUESTS, "capacity"),
        ExecError::Canceled => (StatusCode::BAD_REQUEST, "canceled"),
        ExecError::Infra(_) => (StatusCode::INTERNAL_SERVER_ERROR, "infra_failure"),
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("execution request failed: {error}");
    }
    (status, Json(ExecuteResponse::failure(kind, error.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use seek_common::ValidationError;

    #[test]
    fn test_status_mapping() {
        let (status, body) = error_response(ExecError::Validation(ValidationError::EmptyCode));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_matches!(body.0.error, Some(ref e) if e.kind == "validation");

        let (status, _) = error_response(ExecError::Capacity);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, body) = error_response(ExecError::Infra("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_matches!(body.0.error, Some(ref e) if e.kind == "infra_failure");
    }
}
