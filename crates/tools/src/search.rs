//! `list_files` / `grep` — workspace enumeration and content search.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::Value;

use bc_domain::error::{Error, Result};

/// Hard cap on listed files.
const MAX_LIST_LIMIT: usize = 1000;
/// Grep scans at most this many files.
const MAX_GREP_FILES: usize = 300;
/// Grep returns at most this many matches.
const MAX_GREP_MATCHES: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct ListFilesRequest {
    #[serde(default = "d_pattern")]
    pub pattern: String,
    #[serde(default = "d_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrepRequest {
    pub pattern: String,
    #[serde(default = "d_pattern", rename = "glob")]
    pub glob_pattern: String,
}

fn d_pattern() -> String {
    "**/*".into()
}

fn d_limit() -> usize {
    200
}

/// List files under `cwd` matching a glob pattern. Files only, unique,
/// sorted. Returns `{files[≤limit], total}`.
pub fn list_files(cwd: &Path, req: ListFilesRequest) -> Result<Value> {
    let limit = req.limit.clamp(1, MAX_LIST_LIMIT);
    let matched = glob_files(cwd, &req.pattern, usize::MAX)?;
    let total = matched.len();
    let files: Vec<&String> = matched.iter().take(limit).collect();
    Ok(serde_json::json!({
        "files": files,
        "total": total,
    }))
}

/// Case-insensitive regex search over files matching a glob. Scans up to
/// 300 files and returns up to 200 matches as `{file, line, text}`.
pub async fn grep(cwd: &Path, req: GrepRequest) -> Result<Value> {
    let regex = RegexBuilder::new(&req.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::ToolFailed(format!("invalid grep pattern: {e}")))?;

    let files = glob_files(cwd, &req.glob_pattern, MAX_GREP_FILES)?;

    let mut matches = Vec::new();
    'files: for file in &files {
        let Ok(content) = tokio::fs::read_to_string(cwd.join(file)).await else {
            // Binary or unreadable files are skipped, not fatal.
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(serde_json::json!({
                    "file": file,
                    "line": idx + 1,
                    "text": line,
                }));
                if matches.len() >= MAX_GREP_MATCHES {
                    break 'files;
                }
            }
        }
    }

    Ok(serde_json::json!({ "matches": matches }))
}

/// Enumerate files under `cwd` matching `pattern`: unique, sorted relative
/// paths, capped at `max`. Patterns with parent components are rejected so
/// enumeration cannot leave the working directory.
fn glob_files(cwd: &Path, pattern: &str, max: usize) -> Result<Vec<String>> {
    if Path::new(pattern)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(Error::PathEscape(pattern.to_owned()));
    }

    let full = cwd.join(pattern);
    let paths = glob::glob(full.to_string_lossy().as_ref())
        .map_err(|e| Error::ToolFailed(format!("invalid glob pattern: {e}")))?;

    let mut set = BTreeSet::new();
    for entry in paths.flatten() {
        if !entry.is_file() {
            continue;
        }
        if let Ok(relative) = entry.strip_prefix(cwd) {
            set.insert(relative.to_string_lossy().into_owned());
            if set.len() >= max {
                break;
            }
        }
    }
    Ok(set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let ws = TempDir::new().unwrap();
        std::fs::create_dir_all(ws.path().join("src")).unwrap();
        std::fs::write(ws.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(ws.path().join("src/lib.rs"), "pub fn Run() {}\npub fn walk() {}\n").unwrap();
        std::fs::write(ws.path().join("README.md"), "# Hello\nrun the daemon\n").unwrap();
        ws
    }

    #[test]
    fn list_files_default_pattern_finds_everything() {
        let ws = workspace();
        let result = list_files(
            ws.path(),
            ListFilesRequest {
                pattern: d_pattern(),
                limit: d_limit(),
            },
        )
        .unwrap();
        assert_eq!(result["total"], 3);
        let files = result["files"].as_array().unwrap();
        assert_eq!(files.len(), 3);
        // Sorted, relative, files only.
        assert!(files.iter().any(|f| f == "src/main.rs"));
        assert!(files.iter().any(|f| f == "README.md"));
    }

    #[test]
    fn list_files_respects_limit_but_reports_total() {
        let ws = workspace();
        let result = list_files(
            ws.path(),
            ListFilesRequest {
                pattern: "**/*".into(),
                limit: 1,
            },
        )
        .unwrap();
        assert_eq!(result["files"].as_array().unwrap().len(), 1);
        assert_eq!(result["total"], 3);
    }

    #[test]
    fn list_files_narrow_glob() {
        let ws = workspace();
        let result = list_files(
            ws.path(),
            ListFilesRequest {
                pattern: "src/*.rs".into(),
                limit: 100,
            },
        )
        .unwrap();
        assert_eq!(result["total"], 2);
    }

    #[test]
    fn list_files_rejects_parent_pattern() {
        let ws = workspace();
        let err = list_files(
            ws.path(),
            ListFilesRequest {
                pattern: "../**/*".into(),
                limit: 10,
            },
        )
        .unwrap_err();
        assert!(matches!(err, bc_domain::error::Error::PathEscape(_)));
    }

    #[tokio::test]
    async fn grep_is_case_insensitive() {
        let ws = workspace();
        let result = grep(
            ws.path(),
            GrepRequest {
                pattern: "run".into(),
                glob_pattern: "**/*".into(),
            },
        )
        .await
        .unwrap();
        let matches = result["matches"].as_array().unwrap();
        // "Run()" in lib.rs and "run the daemon" in README.md.
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m["line"].as_u64().unwrap() >= 1));
    }

    #[tokio::test]
    async fn grep_invalid_regex_is_tool_error() {
        let ws = workspace();
        let err = grep(
            ws.path(),
            GrepRequest {
                pattern: "([".into(),
                glob_pattern: "**/*".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, bc_domain::error::Error::ToolFailed(_)));
    }

    #[tokio::test]
    async fn grep_caps_matches() {
        let ws = TempDir::new().unwrap();
        let many_lines = "needle\n".repeat(500);
        std::fs::write(ws.path().join("big.txt"), many_lines).unwrap();
        let result = grep(
            ws.path(),
            GrepRequest {
                pattern: "needle".into(),
                glob_pattern: "**/*".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(result["matches"].as_array().unwrap().len(), MAX_GREP_MATCHES);
    }
}
