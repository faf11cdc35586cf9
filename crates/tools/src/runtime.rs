//! The uniform tool runtime: built-in tools plus external tool-server
//! bindings behind one dispatch surface.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use bc_domain::error::{Error, Result};
use bc_domain::tool::{PermissionOp, ToolSpec};
use bc_mcp_client::{McpManager, ToolCallResult};

use crate::exec::{self, ExecRequest};
use crate::files::{self, ReadFileRequest, WriteFileRequest};
use crate::search::{self, GrepRequest, ListFilesRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bindings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One external tool bound under a composite `mcp.<server>.<tool>` name.
#[derive(Debug, Clone)]
struct McpBinding {
    server: String,
    tool: String,
    description: String,
    schema: Value,
    read_only: bool,
}

impl McpBinding {
    fn permission(&self) -> PermissionOp {
        if self.read_only {
            PermissionOp::Read
        } else {
            PermissionOp::Exec
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRuntime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatches tool invocations by name: built-ins run in-process, composite
/// `mcp.*` names route to their server. Owns the tool-server handles and is
/// responsible for shutting them down.
pub struct ToolRuntime {
    mcp: McpManager,
    bindings: parking_lot::RwLock<HashMap<String, McpBinding>>,
    closed: AtomicBool,
}

impl ToolRuntime {
    /// A runtime with built-in tools only.
    pub fn empty() -> Self {
        Self {
            mcp: McpManager::empty(),
            bindings: parking_lot::RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Spawn the configured tool servers and bind their tools.
    pub async fn with_servers(
        config: &HashMap<String, bc_domain::config::McpServerConfig>,
    ) -> Self {
        let mcp = McpManager::from_config(config).await;
        tracing::info!(servers = mcp.server_count(), "tool runtime ready");

        let mut bindings = HashMap::new();
        for (server, tool) in mcp.list_tools() {
            let name = format!("mcp.{server}.{}", tool.name);
            bindings.insert(
                name,
                McpBinding {
                    server: server.to_owned(),
                    tool: tool.name.clone(),
                    description: tool.description.clone(),
                    schema: tool.input_schema.clone(),
                    read_only: tool.annotations.read_only_hint,
                },
            );
        }

        Self {
            mcp,
            bindings: parking_lot::RwLock::new(bindings),
            closed: AtomicBool::new(false),
        }
    }

    /// All available tools: the five built-ins plus live bindings.
    pub fn list_tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs = builtin_specs();
        let bindings = self.bindings.read();
        let mut names: Vec<&String> = bindings.keys().collect();
        names.sort();
        for name in names {
            let binding = &bindings[name];
            specs.push(ToolSpec {
                name: name.clone(),
                description: binding.description.clone(),
                schema: binding.schema.clone(),
                permission: binding.permission(),
            });
        }
        specs
    }

    /// The permission operation a tool requires. Unknown names gate as
    /// `exec`, the most restrictive default.
    pub fn permission_for(&self, name: &str) -> PermissionOp {
        match name {
            "read_file" | "list_files" | "grep" => PermissionOp::Read,
            "write_file" => PermissionOp::Write,
            "exec" => PermissionOp::Exec,
            _ => self
                .bindings
                .read()
                .get(name)
                .map(|b| b.permission())
                .unwrap_or(PermissionOp::Exec),
        }
    }

    /// Execute a tool by name against `cwd`.
    pub async fn execute_tool(&self, name: &str, input: Value, cwd: &Path) -> Result<Value> {
        match name {
            "read_file" => {
                let req: ReadFileRequest = parse_args(name, input)?;
                files::read_file(cwd, req).await
            }
            "write_file" => {
                let req: WriteFileRequest = parse_args(name, input)?;
                files::write_file(cwd, req).await
            }
            "list_files" => {
                let req: ListFilesRequest = parse_args(name, input)?;
                search::list_files(cwd, req)
            }
            "grep" => {
                let req: GrepRequest = parse_args(name, input)?;
                search::grep(cwd, req).await
            }
            "exec" => {
                let req: ExecRequest = parse_args(name, input)?;
                exec::exec(cwd, req).await
            }
            _ => self.execute_external(name, input).await,
        }
    }

    async fn execute_external(&self, name: &str, input: Value) -> Result<Value> {
        let binding = {
            let bindings = self.bindings.read();
            bindings.get(name).cloned()
        };
        let Some(binding) = binding else {
            return Err(Error::ToolFailed(format!("unknown tool: {name}")));
        };

        let result = self
            .mcp
            .call_tool(&binding.server, &binding.tool, input)
            .await
            .map_err(bc_domain::error::Error::from)?;

        render_tool_call_result(result)
    }

    /// Terminate all tool-server subprocesses and clear the binding table.
    /// Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.mcp.shutdown().await;
        self.bindings.write().clear();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| Error::ToolFailed(format!("invalid {tool} arguments: {e}")))
}

/// Map a tool-server response into a result value: error flag wins, then
/// `structuredContent`, then concatenated text items (JSON fallback for
/// non-text items), then a stringified dump.
fn render_tool_call_result(result: ToolCallResult) -> Result<Value> {
    if result.is_error {
        let detail = result
            .content
            .iter()
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let message = if detail.is_empty() {
            "tool server reported an error".to_owned()
        } else {
            detail
        };
        return Err(Error::ToolFailed(message));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }

    if !result.content.is_empty() {
        let rendered = result
            .content
            .iter()
            .map(|item| {
                if item.content_type == "text" {
                    item.text.clone()
                } else {
                    serde_json::to_string(item).unwrap_or_default()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(Value::String(rendered));
    }

    Ok(serde_json::json!({
        "output": serde_json::to_string(&result.content).unwrap_or_default(),
    }))
}

fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "read_file".into(),
            description: "Read a UTF-8 file relative to the working directory.".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the working directory" }
                },
                "required": ["path"]
            }),
            permission: PermissionOp::Read,
        },
        ToolSpec {
            name: "write_file".into(),
            description: "Write a file, creating parent directories as needed.".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the working directory" },
                    "content": { "type": "string", "description": "Full file content" }
                },
                "required": ["path", "content"]
            }),
            permission: PermissionOp::Write,
        },
        ToolSpec {
            name: "list_files".into(),
            description: "List files matching a glob pattern.".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Glob pattern, default **/*" },
                    "limit": { "type": "integer", "description": "Max files to return (default 200, max 1000)" }
                }
            }),
            permission: PermissionOp::Read,
        },
        ToolSpec {
            name: "grep".into(),
            description: "Search file contents with a case-insensitive regex.".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regular expression" },
                    "glob": { "type": "string", "description": "Glob restricting the files scanned, default **/*" }
                },
                "required": ["pattern"]
            }),
            permission: PermissionOp::Read,
        },
        ToolSpec {
            name: "exec".into(),
            description: "Run a shell command in the working directory.".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to execute" },
                    "timeoutMs": { "type": "integer", "description": "Hard timeout in milliseconds (default 30000)" }
                },
                "required": ["command"]
            }),
            permission: PermissionOp::Exec,
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_specs_are_complete() {
        let runtime = ToolRuntime::empty();
        let specs = runtime.list_tool_specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["read_file", "write_file", "list_files", "grep", "exec"]
        );
    }

    #[test]
    fn permissions_are_intrinsic() {
        let runtime = ToolRuntime::empty();
        assert_eq!(runtime.permission_for("read_file"), PermissionOp::Read);
        assert_eq!(runtime.permission_for("write_file"), PermissionOp::Write);
        assert_eq!(runtime.permission_for("list_files"), PermissionOp::Read);
        assert_eq!(runtime.permission_for("grep"), PermissionOp::Read);
        assert_eq!(runtime.permission_for("exec"), PermissionOp::Exec);
        assert_eq!(runtime.permission_for("mcp.never.seen"), PermissionOp::Exec);
    }

    #[tokio::test]
    async fn dispatch_by_name() {
        let ws = TempDir::new().unwrap();
        let runtime = ToolRuntime::empty();

        runtime
            .execute_tool(
                "write_file",
                serde_json::json!({"path": "a.txt", "content": "alpha"}),
                ws.path(),
            )
            .await
            .unwrap();

        let read = runtime
            .execute_tool("read_file", serde_json::json!({"path": "a.txt"}), ws.path())
            .await
            .unwrap();
        assert_eq!(read["content"], "alpha");

        let listed = runtime
            .execute_tool("list_files", serde_json::json!({}), ws.path())
            .await
            .unwrap();
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn invalid_arguments_are_tool_failures() {
        let ws = TempDir::new().unwrap();
        let runtime = ToolRuntime::empty();
        let err = runtime
            .execute_tool("read_file", serde_json::json!({"nope": 1}), ws.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed(_)));
        assert!(err.to_string().contains("read_file"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_failure() {
        let ws = TempDir::new().unwrap();
        let runtime = ToolRuntime::empty();
        let err = runtime
            .execute_tool("mcp.ghost.tool", serde_json::json!({}), ws.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let runtime = ToolRuntime::empty();
        runtime.close().await;
        runtime.close().await;
        assert!(runtime.list_tool_specs().len() == 5);
    }

    #[test]
    fn render_structured_content_wins() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"t"}],"structuredContent":{"a":1}}"#,
        )
        .unwrap();
        assert_eq!(render_tool_call_result(result).unwrap()["a"], 1);
    }

    #[test]
    fn render_concatenates_text_items() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"one"},{"type":"text","text":"two"}]}"#,
        )
        .unwrap();
        assert_eq!(
            render_tool_call_result(result).unwrap(),
            Value::String("one\ntwo".into())
        );
    }

    #[test]
    fn render_error_flag_is_failure() {
        let result: ToolCallResult =
            serde_json::from_str(r#"{"content":[{"type":"text","text":"boom"}],"isError":true}"#)
                .unwrap();
        let err = render_tool_call_result(result).unwrap_err();
        assert_eq!(err.to_string(), "tool failed: boom");
    }

    #[test]
    fn render_empty_content_stringifies() {
        let result: ToolCallResult = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        let value = render_tool_call_result(result).unwrap();
        assert!(value.get("output").is_some());
    }
}
