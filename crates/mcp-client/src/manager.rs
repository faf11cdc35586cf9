//! Tool-server manager — holds all server connections and orchestrates tool
//! discovery and dispatch.

use std::collections::HashMap;

use serde_json::Value;

use bc_domain::config::McpServerConfig;

use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{StdioTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpServer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One connected tool server.
pub struct McpServer {
    /// Server name from the config map.
    pub name: String,
    /// Tools discovered via `tools/list`.
    pub tools: Vec<McpToolDef>,
    transport: StdioTransport,
}

impl McpServer {
    /// Spawn the process, perform the handshake, and discover tools.
    async fn initialize(name: &str, config: &McpServerConfig) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(config).map_err(McpError::Transport)?;

        let init_params = protocol::initialize_params();
        let params_value = serde_json::to_value(&init_params)
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let resp = transport
            .send_request("initialize", Some(params_value))
            .await
            .map_err(McpError::Transport)?;
        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(McpError::Protocol(format!("initialize failed: {err}")));
        }

        transport
            .send_notification("notifications/initialized")
            .await
            .map_err(McpError::Transport)?;

        let tools_resp = transport
            .send_request("tools/list", None)
            .await
            .map_err(McpError::Transport)?;

        let tools = if tools_resp.is_error() {
            tracing::warn!(
                server = name,
                "tools/list returned error, server will have no tools"
            );
            Vec::new()
        } else {
            let result_value = tools_resp.result.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolsListResult>(result_value) {
                Ok(r) => r.tools,
                Err(e) => {
                    tracing::warn!(server = name, error = %e, "failed to parse tools/list result");
                    Vec::new()
                }
            }
        };

        tracing::info!(server = name, tool_count = tools.len(), "tool server initialized");

        Ok(Self {
            name: name.to_owned(),
            tools,
            transport,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Call a tool by its original (un-prefixed) name.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        if !self.transport.is_alive() {
            return Err(McpError::ServerDown(self.name.clone()));
        }

        // Non-object arguments default to an empty object.
        let arguments = match arguments {
            Value::Object(_) => arguments,
            _ => Value::Object(Default::default()),
        };

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(McpError::Transport)?;

        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(McpError::Protocol(format!("tools/call failed: {err}")));
        }

        let result_value = resp.result.unwrap_or(Value::Null);
        serde_json::from_value::<ToolCallResult>(result_value)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    async fn shutdown(&self) {
        tracing::info!(server = %self.name, "shutting down tool server");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all tool-server connections. Owned by the tool runtime, which is
/// responsible for calling [`McpManager::shutdown`] exactly once per daemon
/// lifetime.
pub struct McpManager {
    servers: HashMap<String, McpServer>,
}

impl McpManager {
    /// A manager with no servers.
    pub fn empty() -> Self {
        Self {
            servers: HashMap::new(),
        }
    }

    /// Spawn and handshake every enabled server. Servers that fail to
    /// initialize are logged and skipped, never fatal.
    pub async fn from_config(config: &HashMap<String, McpServerConfig>) -> Self {
        let mut servers = HashMap::new();

        for (name, server_config) in config {
            if !server_config.enabled {
                tracing::debug!(server = %name, "tool server disabled, skipping");
                continue;
            }
            tracing::info!(
                server = %name,
                command = %server_config.command,
                "initializing tool server"
            );

            match McpServer::initialize(name, server_config).await {
                Ok(server) => {
                    servers.insert(name.clone(), server);
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "failed to initialize tool server, skipping");
                }
            }
        }

        if !servers.is_empty() {
            tracing::info!(count = servers.len(), "tool-server manager ready");
        }

        Self { servers }
    }

    /// All discovered tools across alive servers as `(server_name, tool)`.
    pub fn list_tools(&self) -> Vec<(&str, &McpToolDef)> {
        self.servers
            .values()
            .filter(|s| s.is_alive())
            .flat_map(|server| server.tools.iter().map(move |tool| (server.name.as_str(), tool)))
            .collect()
    }

    /// Call a tool on a specific server.
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let server = self
            .servers
            .get(server_name)
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))?;
        server.call_tool(tool_name, arguments).await
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Shut down all servers concurrently, best effort.
    pub async fn shutdown(&self) {
        let futs: Vec<_> = self.servers.values().map(|s| s.shutdown()).collect();
        futures_util::future::join_all(futs).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("tool-server transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("tool-server protocol error: {0}")]
    Protocol(String),

    #[error("tool server not found: {0}")]
    ServerNotFound(String),

    #[error("tool server is down: {0}")]
    ServerDown(String),
}

impl From<McpError> for bc_domain::error::Error {
    fn from(e: McpError) -> Self {
        bc_domain::error::Error::ToolFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_manager_has_no_tools() {
        let manager = McpManager::empty();
        assert!(manager.is_empty());
        assert_eq!(manager.server_count(), 0);
        assert!(manager.list_tools().is_empty());
    }

    #[tokio::test]
    async fn call_on_unknown_server_fails() {
        let manager = McpManager::empty();
        let err = manager
            .call_tool("ghost", "anything", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ServerNotFound(_)));
    }

    #[tokio::test]
    async fn disabled_servers_are_not_spawned() {
        let mut config = HashMap::new();
        config.insert(
            "off".to_string(),
            McpServerConfig {
                enabled: false,
                command: "definitely-not-a-real-binary".into(),
                args: vec![],
                env: HashMap::new(),
                cwd: None,
            },
        );
        let manager = McpManager::from_config(&config).await;
        assert!(manager.is_empty());
    }
}
