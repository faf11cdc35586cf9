//! External tool-server configuration.
//!
//! These are lightweight config structs deserialized from the `mcp` section
//! of the daemon config. The client logic lives in the `bc-mcp-client`
//! crate.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a single external tool server, keyed by server name in
/// the config map. Tools it advertises surface as `mcp.<name>.<tool>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    /// Disabled servers are never spawned.
    #[serde(default = "d_enabled")]
    pub enabled: bool,

    /// The command to spawn (e.g. `"npx"`).
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the spawned process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

fn d_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_defaults_true() {
        let cfg: McpServerConfig =
            serde_json::from_str(r#"{"command":"npx","args":["-y","some-server"]}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.args.len(), 2);
        assert!(cfg.cwd.is_none());
    }
}
