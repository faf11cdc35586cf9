//! Approval broker — holds in-flight permission requests until a human
//! replies or the auto-deny timer fires.
//!
//! The timer exists so an orphaned request cannot stall a run forever; it
//! is a liveness mechanism, not a safety one. Each request resolves exactly
//! once: replies after resolution are rejected.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use bc_policy::Decision;

use super::{PermissionRequestInfo, RememberRule, Resolution};

struct Pending {
    info: PermissionRequestInfo,
    respond: oneshot::Sender<Resolution>,
}

/// Per-daemon map of live permission requests, keyed by
/// `(session_id, request_id)`.
pub struct ApprovalBroker {
    pending: Mutex<HashMap<String, HashMap<Uuid, Pending>>>,
    timeout: Duration,
}

impl ApprovalBroker {
    /// Create a broker with the given auto-deny timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Park a request and wait for its resolution. When the timer fires
    /// first, the entry is removed and the request resolves as a plain
    /// deny.
    pub async fn enqueue(&self, session_id: &str, info: PermissionRequestInfo) -> Resolution {
        let request_id = info.request_id;
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            pending
                .entry(session_id.to_owned())
                .or_default()
                .insert(request_id, Pending { info, respond: tx });
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_closed)) => {
                self.remove(session_id, &request_id);
                Resolution::deny()
            }
            Err(_elapsed) => {
                tracing::info!(
                    session_id,
                    request_id = %request_id,
                    "permission request timed out, auto-denying"
                );
                self.remove(session_id, &request_id);
                Resolution::deny()
            }
        }
    }

    /// Resolve a pending request. Returns false when the request is
    /// unknown (never existed, already replied, or timed out).
    pub fn reply(
        &self,
        session_id: &str,
        request_id: &Uuid,
        decision: Decision,
        remember: Option<RememberRule>,
    ) -> bool {
        let entry = {
            let mut pending = self.pending.lock();
            let Some(session) = pending.get_mut(session_id) else {
                return false;
            };
            let entry = session.remove(request_id);
            if session.is_empty() {
                pending.remove(session_id);
            }
            entry
        };
        match entry {
            Some(pending) => {
                let _ = pending.respond.send(Resolution { decision, remember });
                true
            }
            None => false,
        }
    }

    /// Snapshot of live requests for a session, oldest first.
    pub fn list(&self, session_id: &str) -> Vec<PermissionRequestInfo> {
        let pending = self.pending.lock();
        let mut requests: Vec<PermissionRequestInfo> = pending
            .get(session_id)
            .map(|session| session.values().map(|p| p.info.clone()).collect())
            .unwrap_or_default();
        requests.sort_by_key(|r| (r.created_at, r.request_id));
        requests
    }

    fn remove(&self, session_id: &str, request_id: &Uuid) {
        let mut pending = self.pending.lock();
        if let Some(session) = pending.get_mut(session_id) {
            session.remove(request_id);
            if session.is_empty() {
                pending.remove(session_id);
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
