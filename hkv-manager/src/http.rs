//! JSON control API: `/node/start`, `/node/execute`, `/node/stop`,
//! `/node/list`, `/healthz`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::registry::NodeManager;

pub fn router(manager: Arc<NodeManager>, default_memory_mb: u64) -> Router {
    Router::new()
        .route("/node/start", post(start_node))
        .route("/node/execute", post(execute_command))
        .route("/node/stop", post(stop_node))
        .route("/node/list", get(list_nodes))
        .route("/healthz", get(healthz))
        .with_state(AppState { manager, default_memory_mb })
}

#[derive(Clone)]
struct AppState {
    manager: Arc<NodeManager>,
    default_memory_mb: u64,
}

#[derive(Debug, Deserialize)]
struct StartNodeRequest {
    tenant_id: String,
    port: u16,
    memory_limit_mb: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StartNodeResponse {
    success: bool,
    tenant_id: String,
    port: u16,
    memory_limit_mb: u64,
}

async fn start_node(
    State(state): State<AppState>,
    Json(req): Json<StartNodeRequest>,
) -> Response {
    let memory_limit_mb = req.memory_limit_mb.unwrap_or(state.default_memory_mb);
    let memory_limit_bytes = (memory_limit_mb as usize).saturating_mul(1024 * 1024);

    match state
        .manager
        .start_node(&req.tenant_id, req.port, memory_limit_bytes)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(StartNodeResponse {
                success: true,
                tenant_id: req.tenant_id,
                port: req.port,
                memory_limit_mb,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(tenant_id = %req.tenant_id, %err, "failed to start tenant node");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    tenant_id: String,
    command: String,
}

async fn execute_command(State(state): State<AppState>, Json(req): Json<ExecuteRequest>) -> Vec<u8> {
    state.manager.execute_command(&req.tenant_id, &req.command)
}

#[derive(Debug, Deserialize)]
struct StopNodeRequest {
    tenant_id: String,
}

#[derive(Debug, Serialize)]
struct StopNodeResponse {
    success: bool,
}

async fn stop_node(State(state): State<AppState>, Json(req): Json<StopNodeRequest>) -> Response {
    match state.manager.stop_node(&req.tenant_id) {
        Ok(()) => (StatusCode::OK, Json(StopNodeResponse { success: true })).into_response(),
        Err(err) => {
            tracing::info!(tenant_id = %req.tenant_id, %err, "stop requested for unknown tenant");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(StopNodeResponse { success: false }))
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct TenantListEntry {
    tenant_id: String,
    port: u16,
    status: &'static str,
    memory_used: usize,
    key_count: usize,
    created_at: String,
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<TenantListEntry>> {
    let entries = state
        .manager
        .list_nodes()
        .into_iter()
        .map(|summary| TenantListEntry {
            tenant_id: summary.tenant_id,
            port: summary.port,
            status: if summary.running { "running" } else { "stopped" },
            memory_used: summary.memory_used,
            key_count: summary.key_count,
            created_at: summary.created_at.to_rfc3339(),
        })
        .collect();
    Json(entries)
}

async fn healthz() -> &'static str {
    "OK"
}
