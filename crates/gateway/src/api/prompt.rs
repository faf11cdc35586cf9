//! `POST /v1/sessions/:id/prompt` — run one prompt through the agent loop.
//!
//! The handler owns the run scaffolding: the user event, the policy
//! snapshot, the cancellation token, and the store-backed event sink and
//! approval resolver. It blocks until the run completes and returns the
//! terminal text plus the run's (possibly amended) working policy.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use bc_domain::error::Error;
use bc_sessions::EventKind;

use crate::runtime::engine::{self, RunOptions};
use crate::runtime::{BrokerResolver, StoreSink};
use crate::state::AppState;

use super::{api_error, not_found};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBody {
    pub prompt: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub async fn prompt(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<PromptBody>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("session"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    let Some(transport) = state.transport.clone() else {
        return api_error(StatusCode::BAD_REQUEST, Error::MissingCredentials.to_string());
    };
    if body.prompt.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "prompt must not be empty");
    }

    if let Err(e) = state
        .store
        .append_event(&session_id, EventKind::User, json!({ "text": body.prompt }))
        .await
    {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    // Per-run snapshot: `remember` rules amend the run's copy, never the
    // daemon policy.
    let policy = state.policy.read().clone();
    let cancel = state.cancels.register(&session_id);

    let mut opts = RunOptions::new(
        body.prompt,
        body.model_id.unwrap_or_else(|| state.config.model.clone()),
        state.cwd.as_ref().clone(),
    );
    opts.policy = policy;
    opts.timeout_ms = Some(body.timeout_ms.unwrap_or(state.config.timeout.model_ms));
    opts.cancel = cancel;

    let sink = Arc::new(StoreSink {
        store: state.store.clone(),
        session_id: session_id.clone(),
    });
    let resolver = Arc::new(BrokerResolver {
        broker: state.approvals.clone(),
        session_id: session_id.clone(),
    });

    let result = engine::run(
        transport.as_ref(),
        Some(state.tools.clone()),
        sink,
        Some(resolver),
        opts,
    )
    .await;
    state.cancels.remove(&session_id);

    match result {
        Ok(outcome) => Json(json!({
            "output": outcome.text,
            "policy": outcome.policy,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "prompt run failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
