/// Shared error type used across all blah-code crates.
///
/// The `ModelTimeout` and `Cancelled` messages deliberately contain the
/// substrings `timeout` and `cancel`: the step engine classifies transport
/// failures by message content.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("no API key available; set BLAH_CODE_API_KEY or run `blah-code login`")]
    MissingCredentials,

    #[error("path '{0}' resolves outside the working directory")]
    PathEscape(String),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("permission {decision} for {tool}")]
    PermissionDenied { tool: String, decision: String },

    #[error("model response timeout after {0}ms")]
    ModelTimeout(u64),

    #[error("run cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("store: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable classification tag used in `run_failed` payloads and API
    /// error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidPolicy(_) => "invalid_policy",
            Error::MissingCredentials => "missing_credentials",
            Error::PathEscape(_) => "path_escape",
            Error::ToolFailed(_) => "tool_failed",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::ModelTimeout(_) => "model_timeout",
            Error::Cancelled => "cancelled",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
            Error::Store(_) => "store",
            Error::Other(_) => "error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
