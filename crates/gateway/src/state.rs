use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use bc_domain::config::{Config, StatePaths};
use bc_policy::Policy;
use bc_providers::ModelTransport;
use bc_sessions::SessionStore;
use bc_tools::ToolRuntime;

use crate::runtime::approval::ApprovalBroker;
use crate::runtime::cancel::CancelMap;

/// Shared application state passed to all API handlers.
///
/// The daemon owns one session store, one tool runtime shared across
/// sessions, one mutable policy value, the approval broker, and the
/// per-session cancellation map. The transport is absent when no API key
/// could be resolved; the prompt endpoint reports that as a 400.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub tools: Arc<ToolRuntime>,
    pub transport: Option<Arc<dyn ModelTransport>>,
    /// Replaced wholesale by the rules endpoint; runs take a snapshot at
    /// start and amend their own copy only.
    pub policy: Arc<RwLock<Policy>>,
    pub approvals: Arc<ApprovalBroker>,
    pub cancels: Arc<CancelMap>,
    pub paths: Arc<StatePaths>,
    /// Working directory tool executions resolve against.
    pub cwd: Arc<PathBuf>,
}
