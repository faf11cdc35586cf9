pub mod permissions;
pub mod prompt;
pub mod sessions;
pub mod status;
pub mod tools;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub(crate) fn not_found(what: impl std::fmt::Display) -> Response {
    api_error(StatusCode::NOT_FOUND, format!("{what} not found"))
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/v1/status", get(status::status))
        .route("/v1/logs", get(status::logs))
        .route("/v1/tools", get(tools::list_tools))
        .route(
            "/v1/permissions/rules",
            get(permissions::get_rules).post(permissions::replace_rules),
        )
        .route(
            "/v1/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route(
            "/v1/sessions/:id",
            get(sessions::get_session).patch(sessions::rename_session),
        )
        .route("/v1/sessions/:id/prompt", post(prompt::prompt))
        .route("/v1/sessions/:id/events", get(sessions::list_events))
        .route("/v1/sessions/:id/events/stream", get(sessions::stream_events))
        .route("/v1/sessions/:id/permissions", get(permissions::list_pending))
        .route(
            "/v1/sessions/:id/permissions/:request_id/reply",
            post(permissions::reply),
        )
        .route("/v1/sessions/:id/cancel", post(sessions::cancel_session))
        .route("/v1/sessions/:id/checkpoint", post(sessions::checkpoint))
        .route("/v1/sessions/:id/revert", post(sessions::revert))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
