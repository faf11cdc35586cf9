//! Path containment for file tools.
//!
//! Tool paths resolve against the run's working directory and are rejected
//! when they escape it. Resolution is purely lexical — no filesystem access
//! happens before the containment check, so a rejected path performs no
//! I/O at all.

use std::path::{Component, Path, PathBuf};

use bc_domain::error::{Error, Result};

/// Resolve `requested` against `cwd`, rejecting any path that lands outside
/// `cwd`. Absolute paths are permitted as long as they stay inside.
pub fn resolve_within(cwd: &Path, requested: &str) -> Result<PathBuf> {
    let requested_path = Path::new(requested);
    let candidate = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        cwd.join(requested_path)
    };

    let root = normalize(cwd);
    let resolved = normalize(&candidate);

    if !resolved.starts_with(&root) {
        return Err(Error::PathEscape(requested.to_owned()));
    }
    Ok(resolved)
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
