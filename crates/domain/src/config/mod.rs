//! Daemon configuration: discovery, parsing, defaults, validation.
//!
//! Config files are JSON. Discovery precedence: `./blah-code.json`,
//! `./.blah-code.json`, `<home>/.blah-code/config.json`; the first file
//! found wins, and absence of all three yields the defaults. Unknown fields
//! are ignored; malformed JSON fails fast with [`Error::InvalidConfig`]
//! (or [`Error::InvalidPolicy`] when the `permission` section is the part
//! that does not parse).

mod mcp;

pub use mcp::*;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bc_policy::Policy;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default model identifier for prompt runs.
    #[serde(default = "d_model")]
    pub model: String,

    #[serde(default)]
    pub timeout: TimeoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    /// User permission policy; normalized over the built-in defaults at
    /// load time.
    #[serde(default)]
    pub permission: Policy,

    /// External tool servers, keyed by server name.
    #[serde(default)]
    pub mcp: HashMap<String, McpServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: d_model(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
            daemon: DaemonConfig::default(),
            permission: bc_policy::normalize(Policy::default()),
            mcp: HashMap::new(),
        }
    }
}

fn d_model() -> String {
    "claude-sonnet-4-20250514".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sections
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Model completion timeout, milliseconds. Valid range 1000..=600000.
    #[serde(default = "d_model_ms")]
    pub model_ms: u64,

    /// Auto-deny timeout for pending permission requests, milliseconds.
    #[serde(default = "d_approval_ms")]
    pub approval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            model_ms: d_model_ms(),
            approval_ms: d_approval_ms(),
        }
    }
}

fn d_model_ms() -> u64 {
    60_000
}

fn d_approval_ms() -> u64 {
    300_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_log_level")]
    pub level: LogLevel,

    /// When true, log lines are mirrored to stderr in addition to the log
    /// file.
    #[serde(default)]
    pub print: bool,

    /// How many rotated log files to keep.
    #[serde(default = "d_retain")]
    pub retain: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: d_log_level(),
            print: false,
            retain: d_retain(),
        }
    }
}

fn d_log_level() -> LogLevel {
    LogLevel::Info
}

fn d_retain() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default = "d_host")]
    pub host: String,

    #[serde(default = "d_port")]
    pub port: u16,

    /// When set, CLI commands attach to this URL instead of
    /// `http://host:port`.
    #[serde(default)]
    pub attach_url: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            attach_url: None,
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    4117
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loading & discovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Parse a config file. The `permission` section is parsed separately so
    /// a bad policy reports as [`Error::InvalidPolicy`] rather than a
    /// generic config error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|e| match e {
            Error::InvalidPolicy(_) => e,
            other => Error::InvalidConfig(format!("{}: {other}", path.display())),
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| Error::InvalidConfig(format!("malformed JSON: {e}")))?;

        if let Some(permission) = value.get("permission") {
            serde_json::from_value::<Policy>(permission.clone())
                .map_err(|e| Error::InvalidPolicy(e.to_string()))?;
        }

        let mut config: Config = serde_json::from_value(value)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.permission = bc_policy::normalize(config.permission);
        Ok(config)
    }

    /// Locate and load the config: `./blah-code.json`, `./.blah-code.json`,
    /// `<home>/.blah-code/config.json`, first match wins. Returns the
    /// defaults (and `None`) when no file exists.
    pub fn discover(cwd: &Path, home: &Path) -> Result<(Self, Option<PathBuf>)> {
        let candidates = [
            cwd.join("blah-code.json"),
            cwd.join(".blah-code.json"),
            home.join(".blah-code").join("config.json"),
        ];
        for candidate in candidates {
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok((config, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Range checks the JSON schema cannot express.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if !(1_000..=600_000).contains(&self.timeout.model_ms) {
            issues.push(ConfigIssue::error(
                "timeout.modelMs",
                format!(
                    "{} is outside the valid range 1000..=600000",
                    self.timeout.model_ms
                ),
            ));
        }
        if self.daemon.port == 0 {
            issues.push(ConfigIssue::error("daemon.port", "port must be non-zero"));
        }
        if self.logging.retain == 0 {
            issues.push(ConfigIssue::warning(
                "logging.retain",
                "retention of 0 discards all rotated logs",
            ));
        }
        for (name, server) in &self.mcp {
            if server.enabled && server.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    format!("mcp.{name}.command"),
                    "enabled server has an empty command",
                ));
            }
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation issues
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durable state layout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Filesystem layout under `<home>/.blah-code/`.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_dir: PathBuf,
}

impl StatePaths {
    pub fn new(home: &Path) -> Self {
        Self {
            state_dir: home.join(".blah-code"),
        }
    }

    /// Resolve against the current user's home directory.
    pub fn from_home_dir() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::InvalidConfig("cannot resolve home directory".into()))?;
        Ok(Self::new(&home))
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("sessions.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir().join("current.log")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.state_dir.join("credentials.json")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use bc_policy::{evaluate, Decision};

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.timeout.model_ms, 60_000);
        assert_eq!(config.daemon.host, "127.0.0.1");
    }

    #[test]
    fn parse_normalizes_permission_defaults() {
        let config = Config::parse(r#"{"permission":{"exec":"allow"}}"#).unwrap();
        assert_eq!(
            evaluate(&config.permission, "exec", None, Some("ls")),
            Decision::Allow
        );
        assert_eq!(
            evaluate(&config.permission, "read", None, Some("f")),
            Decision::Allow
        );
        assert_eq!(
            evaluate(&config.permission, "write", None, Some("f")),
            Decision::Ask
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config = Config::parse(r#"{"model":"m1","futureKnob":{"x":1}}"#).unwrap();
        assert_eq!(config.model, "m1");
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        let err = Config::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn bad_policy_is_invalid_policy() {
        let err = Config::parse(r#"{"permission":{"exec":"sometimes"}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy(_)));
    }

    #[test]
    fn model_ms_out_of_range_is_an_error() {
        let config = Config::parse(r#"{"timeout":{"modelMs":100}}"#).unwrap();
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error && i.field == "timeout.modelMs"));
    }

    #[test]
    fn discover_prefers_project_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let home = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("blah-code.json"), r#"{"model":"project"}"#).unwrap();
        std::fs::write(dir.path().join(".blah-code.json"), r#"{"model":"hidden"}"#).unwrap();

        let (config, path) = Config::discover(dir.path(), home.path()).unwrap();
        assert_eq!(config.model, "project");
        assert!(path.unwrap().ends_with("blah-code.json"));
    }

    #[test]
    fn discover_falls_back_to_home_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let home = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join(".blah-code")).unwrap();
        std::fs::write(
            home.path().join(".blah-code/config.json"),
            r#"{"model":"from-home"}"#,
        )
        .unwrap();

        let (config, path) = Config::discover(dir.path(), home.path()).unwrap();
        assert_eq!(config.model, "from-home");
        assert!(path.is_some());
    }

    #[test]
    fn discover_without_files_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let home = tempfile::TempDir::new().unwrap();
        let (config, path) = Config::discover(dir.path(), home.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.model, d_model());
    }

    #[test]
    fn state_paths_layout() {
        let paths = StatePaths::new(Path::new("/home/u"));
        assert_eq!(paths.db_path(), Path::new("/home/u/.blah-code/sessions.db"));
        assert_eq!(
            paths.log_path(),
            Path::new("/home/u/.blah-code/logs/current.log")
        );
    }
}
