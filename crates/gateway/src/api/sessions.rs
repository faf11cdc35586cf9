//! Session management endpoints: creation, listing, renaming, the event
//! log (poll and SSE), cancellation, and checkpoint/revert markers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use bc_sessions::EventKind;

use crate::state::AppState;

use super::{api_error, not_found};

/// How often the SSE stream emits a heartbeat.
const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CRUD
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_session(State(state): State<AppState>) -> Response {
    match state.store.create_session().await {
        Ok(id) => Json(json!({ "sessionId": id })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "d_limit")]
    pub limit: i64,
}

fn d_limit() -> i64 {
    50
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Response {
    match state.store.list_sessions(query.limit).await {
        Ok(sessions) => Json(json!({ "sessions": sessions })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => not_found("session"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

pub async fn rename_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Response {
    match state.store.update_session_name(&session_id, &body.name).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(bc_domain::Error::NotFound(_)) => not_found("session"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("session"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    match state.store.list_events(&session_id).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Snapshot-plus-live-tail stream.
///
/// One `snapshot` event carries the full log; every later append arrives
/// as an `update`. The snapshot is taken atomically with subscription, so
/// live events it already contains are suppressed by id rather than
/// replayed. A `heartbeat` fires every 30 seconds.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("session"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    let (snapshot, mut rx) = match state.store.snapshot_and_subscribe(&session_id).await {
        Ok(pair) => pair,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let last_snapshot_id = snapshot.last().map(|e| e.id).unwrap_or(0);

    let stream = async_stream::stream! {
        yield Ok::<_, std::convert::Infallible>(
            Event::default()
                .event("snapshot")
                .data(json!({ "events": snapshot }).to_string()),
        );

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => {
                        if event.id <= last_snapshot_id {
                            continue;
                        }
                        yield Ok(Event::default()
                            .event("update")
                            .data(json!({ "event": event }).to_string()));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        yield Ok(Event::default()
                            .event("warning")
                            .data(json!({ "missedEvents": missed }).to_string()));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = heartbeat.tick() => {
                    yield Ok(Event::default()
                        .event("heartbeat")
                        .data(json!({ "ts": chrono::Utc::now().timestamp_millis() }).to_string()));
                }
            }
        }
    };

    Sse::new(stream).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("session"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    let signalled = state.cancels.cancel(&session_id);
    tracing::info!(session_id, signalled, "cancellation requested");
    Json(json!({ "success": true })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Checkpoint / revert markers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CheckpointBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Appends a checkpoint marker event. No workspace snapshot is taken.
pub async fn checkpoint(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<CheckpointBody>,
) -> Response {
    let checkpoint_id = uuid::Uuid::new_v4().to_string();
    let payload = json!({
        "checkpointId": checkpoint_id,
        "name": body.name,
        "summary": body.summary,
    });
    match state
        .store
        .append_event(&session_id, EventKind::Checkpoint, payload)
        .await
    {
        Ok(_) => Json(json!({ "checkpointId": checkpoint_id })).into_response(),
        Err(bc_domain::Error::NotFound(_)) => not_found("session"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertBody {
    pub checkpoint_id: String,
}

/// Appends a revert marker referencing an existing checkpoint. Marker
/// only — no rollback of any kind is performed.
pub async fn revert(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<RevertBody>,
) -> Response {
    let events = match state.store.list_events(&session_id).await {
        Ok(events) => events,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let exists = events.iter().any(|e| {
        e.kind == EventKind::Checkpoint
            && e.payload.get("checkpointId").and_then(|v| v.as_str()) == Some(&body.checkpoint_id)
    });
    if !exists {
        return not_found("checkpoint");
    }

    match state
        .store
        .append_event(
            &session_id,
            EventKind::Revert,
            json!({ "checkpointId": body.checkpoint_id }),
        )
        .await
    {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(bc_domain::Error::NotFound(_)) => not_found("session"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
