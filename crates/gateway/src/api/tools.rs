//! `GET /v1/tools` — the tools available to runs, built-ins and external
//! bindings alike.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "tools": state.tools.list_tool_specs() }))
}
