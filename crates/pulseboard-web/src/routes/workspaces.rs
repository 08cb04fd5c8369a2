//! Workspace registration endpoints, used by out-of-process tooling to
//! announce workspaces at runtime.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;
use crate::workspaces::WorkspaceEntry;

#[derive(Deserialize)]
pub struct RegisterWorkspaceRequest {
    pub path: String,
    pub db_path: String,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub path: String,
}

#[derive(Serialize)]
pub struct WorkspaceListResponse {
    pub workspaces: Vec<WorkspaceEntry>,
    pub active: Option<String>,
}

/// Register (or re-register) a workspace.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterWorkspaceRequest>,
) -> StatusCode {
    info!(workspace = %req.path, db = %req.db_path, "Workspace registration");
    state.engine.register_workspace(&req.path, &req.db_path);
    StatusCode::OK
}

/// List registered workspaces.
pub async fn list(State(state): State<AppState>) -> Json<WorkspaceListResponse> {
    let (workspaces, active) = state.engine.workspaces.list();
    Json(WorkspaceListResponse { workspaces, active })
}

/// Switch the active workspace.
pub async fn set_active(
    State(state): State<AppState>,
    Json(req): Json<SetActiveRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .engine
        .set_active_workspace(&req.path)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(StatusCode::OK)
}
