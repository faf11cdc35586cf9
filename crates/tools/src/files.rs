//! `read_file` / `write_file` — UTF-8 file I/O constrained to the working
//! directory.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use bc_domain::error::Result;

use crate::path::resolve_within;

#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileRequest {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
}

/// Read a UTF-8 file. Returns `{path, content}`.
pub async fn read_file(cwd: &Path, req: ReadFileRequest) -> Result<Value> {
    let path = resolve_within(cwd, &req.path)?;
    let content = fs::read_to_string(&path).await?;
    Ok(serde_json::json!({
        "path": req.path,
        "content": content,
    }))
}

/// Write a file, creating missing parent directories. Returns
/// `{path, bytes}`.
pub async fn write_file(cwd: &Path, req: WriteFileRequest) -> Result<Value> {
    let path = resolve_within(cwd, &req.path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, req.content.as_bytes()).await?;
    Ok(serde_json::json!({
        "path": req.path,
        "bytes": req.content.len(),
    }))
}
