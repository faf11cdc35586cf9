use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of event kinds a session log can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    AssistantDelta,
    Assistant,
    ToolCall,
    ToolResult,
    PermissionRequest,
    PermissionResolved,
    RunFinished,
    RunFailed,
    ModelTimeout,
    Error,
    Done,
    Checkpoint,
    Revert,
    User,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run_started",
            EventKind::AssistantDelta => "assistant_delta",
            EventKind::Assistant => "assistant",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResult => "tool_result",
            EventKind::PermissionRequest => "permission_request",
            EventKind::PermissionResolved => "permission_resolved",
            EventKind::RunFinished => "run_finished",
            EventKind::RunFailed => "run_failed",
            EventKind::ModelTimeout => "model_timeout",
            EventKind::Error => "error",
            EventKind::Done => "done",
            EventKind::Checkpoint => "checkpoint",
            EventKind::Revert => "revert",
            EventKind::User => "user",
        }
    }

    /// Parse a stored kind column. Returns `None` for strings outside the
    /// closed set (possible only if the database was written externally).
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(Value::String(raw.to_owned())).ok()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored event. `created_at` is unix milliseconds; within a session,
/// `(created_at, id)` is a total order consistent with append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: i64,
    pub session_id: String,
    pub kind: EventKind,
    pub payload: Value,
    pub created_at: i64,
}

/// Session listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: i64,
    pub last_event_at: Option<i64>,
    pub event_count: i64,
}
