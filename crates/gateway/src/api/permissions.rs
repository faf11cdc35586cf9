//! Permission policy and approval endpoints.
//!
//! - `GET  /v1/permissions/rules`                     — current policy
//! - `POST /v1/permissions/rules`                     — replace the policy
//! - `GET  /v1/sessions/:id/permissions`              — live requests
//! - `POST /v1/sessions/:id/permissions/:rid/reply`   — resolve a request

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use bc_policy::{Decision, Policy};

use crate::runtime::RememberRule;
use crate::state::AppState;

use super::{api_error, not_found};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy rules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_rules(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "policy": *state.policy.read() }))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRulesBody {
    pub policy: serde_json::Value,
}

/// Replace the daemon policy wholesale. Runs already in flight keep their
/// snapshot.
pub async fn replace_rules(
    State(state): State<AppState>,
    Json(body): Json<ReplaceRulesBody>,
) -> Response {
    let parsed: Policy = match serde_json::from_value(body.policy) {
        Ok(p) => p,
        Err(e) => {
            return api_error(StatusCode::BAD_REQUEST, format!("invalid policy: {e}"));
        }
    };
    let normalized = bc_policy::normalize(parsed);
    *state.policy.write() = normalized.clone();
    tracing::info!("permission policy replaced");

    Json(serde_json::json!({ "success": true, "policy": normalized })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pending approvals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_pending(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => Json(state.approvals.list(&session_id)).into_response(),
        Ok(None) => not_found("session"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub decision: Decision,
    #[serde(default)]
    pub remember: Option<RememberBody>,
}

#[derive(Debug, Deserialize)]
pub struct RememberBody {
    pub key: String,
    pub pattern: String,
    /// Defaults to the reply decision when omitted.
    #[serde(default)]
    pub decision: Option<Decision>,
}

pub async fn reply(
    State(state): State<AppState>,
    Path((session_id, request_id)): Path<(String, Uuid)>,
    Json(body): Json<ReplyBody>,
) -> Response {
    let remember = body.remember.map(|r| RememberRule {
        key: r.key,
        pattern: r.pattern,
        decision: r.decision.unwrap_or(body.decision),
    });

    if state
        .approvals
        .reply(&session_id, &request_id, body.decision, remember)
    {
        Json(serde_json::json!({ "success": true })).into_response()
    } else {
        not_found("permission request")
    }
}
