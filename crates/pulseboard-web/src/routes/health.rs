//! Liveness endpoint.

use axum::{extract::State, Json};
use serde_json::json;

use crate::state::AppState;

/// Server status and a few counters.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = &state.engine;
    let issues = pulseboard_db::queries::issues::count_issues(&engine.pool()).ok();
    Json(json!({
        "status": "ok",
        "connections": engine.connections.count(),
        "subscriptions": engine.subscriptions.count(),
        "active_workspace": engine.workspaces.active().map(|w| w.path),
        "issues": issues,
    }))
}
