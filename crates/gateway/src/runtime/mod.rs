//! Runtime pieces of the daemon: the agent step engine, the approval
//! broker, per-session cancellation, and the glue between them and the
//! session store.

pub mod approval;
pub mod cancel;
pub mod engine;
pub mod parse;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use bc_domain::tool::PermissionOp;
use bc_policy::Decision;
use bc_sessions::{EventKind, SessionStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Permission request / resolution types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A permission request awaiting a decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestInfo {
    pub request_id: Uuid,
    pub op: PermissionOp,
    pub tool: String,
    pub target: String,
    pub args: Value,
    pub created_at: i64,
}

/// A rule to fold into the run's working policy when resolving an ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RememberRule {
    pub key: String,
    pub pattern: String,
    pub decision: Decision,
}

/// Terminal resolution of a permission request.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub decision: Decision,
    pub remember: Option<RememberRule>,
}

impl Resolution {
    pub fn deny() -> Self {
        Self {
            decision: Decision::Deny,
            remember: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine callbacks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Receives every lifecycle event the engine emits. Emission is awaited so
/// event order equals emission order.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, kind: EventKind, payload: Value);
}

/// Suspends the engine while a human (or the auto-deny timer) decides an
/// `ask`.
#[async_trait::async_trait]
pub trait PermissionResolver: Send + Sync {
    async fn resolve(&self, request: PermissionRequestInfo) -> Resolution;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store-backed implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Appends every engine event to a session's log. Store failures are
/// logged and swallowed so a transient write error cannot kill the run.
pub struct StoreSink {
    pub store: Arc<SessionStore>,
    pub session_id: String,
}

#[async_trait::async_trait]
impl EventSink for StoreSink {
    async fn emit(&self, kind: EventKind, payload: Value) {
        if let Err(e) = self.store.append_event(&self.session_id, kind, payload).await {
            tracing::warn!(
                session_id = %self.session_id,
                kind = %kind,
                error = %e,
                "failed to append run event"
            );
        }
    }
}

/// Routes permission requests through the daemon's approval broker.
pub struct BrokerResolver {
    pub broker: Arc<approval::ApprovalBroker>,
    pub session_id: String,
}

#[async_trait::async_trait]
impl PermissionResolver for BrokerResolver {
    async fn resolve(&self, request: PermissionRequestInfo) -> Resolution {
        self.broker.enqueue(&self.session_id, request).await
    }
}
