//! `exec` — run a shell command in the working directory.
//!
//! Non-zero exit is a normal result, never an error. A hard timeout kills
//! the child; the response then carries exit code -1 and a timeout marker
//! in stderr.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use bc_domain::error::{Error, Result};

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecRequest {
    pub command: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

fn d_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Run `command` via the shell. Returns
/// `{command, exitCode, stdout, stderr}`.
pub async fn exec(cwd: &Path, req: ExecRequest) -> Result<Value> {
    let timeout_ms = req.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&req.command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::ToolFailed(format!("failed to spawn '{}': {e}", req.command)))?;

    // Drain the pipes concurrently so a chatty child cannot deadlock on a
    // full pipe buffer while we wait for it.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let timeout = std::time::Duration::from_millis(timeout_ms);
    let (exit_code, timed_out) = tokio::select! {
        status = child.wait() => {
            let code = status
                .map_err(|e| Error::ToolFailed(format!("failed to wait for child: {e}")))?
                .code()
                .unwrap_or(-1);
            (code, false)
        }
        _ = tokio::time::sleep(timeout) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            (-1, true)
        }
    };

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let mut stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
    if timed_out {
        stderr.push_str(&format!("\n[timed out after {timeout_ms}ms]"));
    }

    Ok(serde_json::json!({
        "command": req.command,
        "exitCode": exit_code,
        "stdout": stdout,
        "stderr": stderr,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let ws = TempDir::new().unwrap();
        let result = exec(
            ws.path(),
            ExecRequest {
                command: "echo hello".into(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        )
        .await
        .unwrap();
        assert_eq!(result["exitCode"], 0);
        assert_eq!(result["stdout"], "hello\n");
        assert_eq!(result["command"], "echo hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let ws = TempDir::new().unwrap();
        let result = exec(
            ws.path(),
            ExecRequest {
                command: "echo oops >&2; exit 3".into(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        )
        .await
        .unwrap();
        assert_eq!(result["exitCode"], 3);
        assert_eq!(result["stderr"], "oops\n");
    }

    #[tokio::test]
    async fn runs_in_the_working_directory() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("marker.txt"), "x").unwrap();
        let result = exec(
            ws.path(),
            ExecRequest {
                command: "ls".into(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        )
        .await
        .unwrap();
        assert!(result["stdout"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn timeout_kills_and_marks() {
        let ws = TempDir::new().unwrap();
        let start = std::time::Instant::now();
        let result = exec(
            ws.path(),
            ExecRequest {
                command: "sleep 30".into(),
                timeout_ms: 150,
            },
        )
        .await
        .unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(result["exitCode"], -1);
        assert!(result["stderr"].as_str().unwrap().contains("timed out after 150ms"));
    }

    #[tokio::test]
    async fn out_of_range_timeout_is_clamped() {
        let ws = TempDir::new().unwrap();
        // 1ms clamps up to 100ms; the command still finishes well inside it.
        let result = exec(
            ws.path(),
            ExecRequest {
                command: "true".into(),
                timeout_ms: 1,
            },
        )
        .await
        .unwrap();
        assert_eq!(result["exitCode"], 0);
    }
}
