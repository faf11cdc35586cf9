//! Daemon startup: build the shared state from config, bind the listener,
//! serve until shutdown, then release owned resources.

use std::sync::Arc;

use anyhow::Context;

use bc_domain::config::{Config, StatePaths};
use bc_providers::AnthropicTransport;
use bc_sessions::SessionStore;
use bc_tools::ToolRuntime;

use crate::api;
use crate::runtime::approval::ApprovalBroker;
use crate::runtime::cancel::CancelMap;
use crate::state::AppState;

/// Build the application state: session store, tool runtime (spawning
/// configured tool servers), transport, broker, cancel map.
pub async fn build_state(config: Arc<Config>, paths: StatePaths) -> anyhow::Result<AppState> {
    let cwd = std::env::current_dir().context("cannot resolve working directory")?;

    let store = SessionStore::open(&paths.db_path())
        .await
        .context("opening session store")?;

    let tools = ToolRuntime::with_servers(&config.mcp).await;

    let transport = match bc_providers::resolve_api_key(&paths) {
        Some(api_key) => {
            Some(Arc::new(AnthropicTransport::new(api_key)) as Arc<dyn bc_providers::ModelTransport>)
        }
        None => {
            tracing::warn!("no API key resolved; prompt requests will be rejected");
            None
        }
    };

    let approval_timeout = std::time::Duration::from_millis(config.timeout.approval_ms);

    Ok(AppState {
        policy: Arc::new(parking_lot::RwLock::new(config.permission.clone())),
        config,
        store: Arc::new(store),
        tools: Arc::new(tools),
        transport,
        approvals: Arc::new(ApprovalBroker::new(approval_timeout)),
        cancels: Arc::new(CancelMap::new()),
        paths: Arc::new(paths),
        cwd: Arc::new(cwd),
    })
}

/// Start the daemon and serve until ctrl-c.
pub async fn run_server(config: Arc<Config>, paths: StatePaths) -> anyhow::Result<()> {
    tracing::info!(model = %config.model, "blah-code daemon starting");

    let addr = format!("{}:{}", config.daemon.host, config.daemon.port);
    let state = build_state(config, paths).await?;
    let tools = state.tools.clone();

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // Subprocess-backed tools are terminated on daemon shutdown.
    tools.close().await;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
}
