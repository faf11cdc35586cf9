//! Per-session cancellation tokens.
//!
//! Each running prompt registers a token under its session id. Cancelling a
//! session signals the token, which the engine checks between steps and the
//! transport observes mid-call.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Tracks active cancellation tokens per session.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a fresh token for a session, replacing any
    /// previous one.
    pub fn register(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .insert(session_id.to_owned(), token.clone());
        token
    }

    /// Signal cancellation for a session. Returns true when a token was
    /// registered.
    pub fn cancel(&self, session_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(session_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Remove the token for a session (called when a run completes).
    pub fn remove(&self, session_id: &str) {
        self.tokens.lock().remove(session_id);
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.tokens.lock().contains_key(session_id)
    }

    /// Sessions with a run in flight, sorted.
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tokens.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("s1");
        assert!(!token.is_cancelled());
        assert!(map.is_running("s1"));

        assert!(map.cancel("s1"));
        assert!(token.is_cancelled());

        map.remove("s1");
        assert!(!map.is_running("s1"));
        assert!(!map.cancel("s1"));
    }

    #[test]
    fn cancel_unknown_session_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("ghost"));
    }

    #[test]
    fn register_replaces_previous_token() {
        let map = CancelMap::new();
        let old = map.register("s1");
        let new = map.register("s1");

        map.cancel("s1");
        assert!(new.is_cancelled());
        // The replaced token is orphaned, not cancelled through the map.
        assert!(!old.is_cancelled());
    }

    #[test]
    fn active_sessions_is_sorted() {
        let map = CancelMap::new();
        map.register("b");
        map.register("a");
        assert_eq!(map.active_sessions(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        map.register("s1");
        map.remove("s1");
        map.remove("s1");
        assert!(!map.is_running("s1"));
    }
}
