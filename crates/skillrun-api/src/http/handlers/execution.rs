//! Execution handlers for the REST API.
//!
//! Thin glue over the orchestrator's exposed surface: start a run, inspect
//! status, list a skill's executions, and stop an installation's runs.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::{Json, Router};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use skillrun_types::execution::SkillExecutionStatus;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request/query types
// ---------------------------------------------------------------------------

/// Body for starting an execution.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub installation_id: Uuid,
    #[serde(default)]
    pub input: Value,
}

/// Query parameters for listing executions.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<SkillExecutionStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the execution sub-router, mounted at `/api/v1`.
pub fn execution_routes() -> Router<AppState> {
    Router::new()
        .route("/executions", post(start_execution))
        .route("/executions/{id}", get(get_execution))
        .route("/skills/{skill_id}/executions", get(list_executions))
        .route("/installations/{id}/stop", post(stop_executions))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/executions - Start a skill execution.
pub async fn start_execution(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let execution_id = state
        .orchestrator
        .start(body.installation_id, body.input)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({ "execution_id": execution_id }), request_id, elapsed)
        .with_link("status", &format!("/api/v1/executions/{execution_id}"));
    Ok(Json(resp))
}

/// GET /api/v1/executions/:id - Full status view of an execution.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let view = state.orchestrator.get_status(id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::to_value(&view).unwrap_or(Value::Null),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/executions/{id}"));
    Ok(Json(resp))
}

/// GET /api/v1/skills/:skill_id/executions - Paginated execution listing.
pub async fn list_executions(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let page = state
        .orchestrator
        .list_executions(skill_id, query.status, query.page, query.per_page)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::to_value(&page).unwrap_or(Value::Null),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/skills/{skill_id}/executions"));
    Ok(Json(resp))
}

/// POST /api/v1/installations/:id/stop - Cancel an installation's runs.
pub async fn stop_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let stopped = state.orchestrator.stop_running_executions(id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({ "stopped_executions": stopped }),
        request_id,
        elapsed,
    );
    Ok(Json(resp))
}
