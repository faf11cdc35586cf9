use serde::{Deserialize, Serialize};

/// The permission operation a tool action falls under. Every tool carries
/// exactly one; the policy engine is consulted with it before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionOp {
    Read,
    Write,
    Exec,
    Network,
}

impl PermissionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionOp::Read => "read",
            PermissionOp::Write => "write",
            PermissionOp::Exec => "exec",
            PermissionOp::Network => "network",
        }
    }
}

impl std::fmt::Display for PermissionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool advertised to the model: name, human description, JSON Schema for
/// its arguments, and the permission operation it requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub schema: serde_json::Value,
    pub permission: PermissionOp,
}
