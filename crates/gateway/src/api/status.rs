//! Daemon introspection endpoints.
//!
//! - `GET /health`    — liveness probe
//! - `GET /v1/status` — daemon mode, paths, model, active sessions
//! - `GET /v1/logs`   — tail of the current log file

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "mode": "daemon",
        "cwd": state.cwd.display().to_string(),
        "modelId": state.config.model,
        "apiKeyPresent": state.transport.is_some(),
        "activeSessions": state.cancels.active_sessions(),
        "dbPath": state.paths.db_path().display().to_string(),
        "logPath": state.paths.log_path().display().to_string(),
        "daemonHealthy": true,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "d_lines")]
    pub lines: usize,
}

fn d_lines() -> usize {
    100
}

pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let path = state.paths.log_path();
    let content = tokio::fs::read_to_string(&path).await.unwrap_or_default();
    let all: Vec<&str> = content.lines().collect();
    let tail: Vec<&str> = all
        .iter()
        .skip(all.len().saturating_sub(query.lines))
        .copied()
        .collect();

    Json(serde_json::json!({
        "path": path.display().to_string(),
        "lines": tail,
    }))
}
