//! Log file rotation and tracing initialization.
//!
//! The daemon writes to `<home>/.blah-code/logs/current.log`. A non-empty
//! current log rotates to a timestamped sibling on startup; retention
//! keeps only the N newest rotated files.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bc_domain::config::{LoggingConfig, StatePaths};

const ROTATED_PREFIX: &str = "blah-code-";

/// Rotate a non-empty `current.log` aside and prune old rotations.
pub fn rotate_on_startup(paths: &StatePaths, retain: usize) -> std::io::Result<()> {
    let dir = paths.logs_dir();
    std::fs::create_dir_all(&dir)?;

    let current = paths.log_path();
    let non_empty = current.metadata().map(|m| m.len() > 0).unwrap_or(false);
    if non_empty {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let rotated = dir.join(format!("{ROTATED_PREFIX}{stamp}.log"));
        std::fs::rename(&current, &rotated)?;
    }

    prune_rotated(&dir, retain)
}

/// Keep only the `retain` newest rotated files. Timestamped names sort
/// chronologically, so name order is age order.
fn prune_rotated(dir: &Path, retain: usize) -> std::io::Result<()> {
    let mut rotated: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(ROTATED_PREFIX) && name.ends_with(".log"))
        .collect();
    rotated.sort();
    rotated.reverse();

    for stale in rotated.iter().skip(retain) {
        let path = dir.join(stale);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to prune rotated log");
        }
    }
    Ok(())
}

/// Initialize tracing: file output always, stderr when `print` is set.
pub fn init_tracing(config: &LoggingConfig, paths: &StatePaths) -> anyhow::Result<()> {
    rotate_on_startup(paths, config.retain)?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_path())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},bc_gateway=debug", config.level.as_str())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .with(
            config
                .print
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_current_log_is_not_rotated() {
        let home = tempfile::TempDir::new().unwrap();
        let paths = StatePaths::new(home.path());
        std::fs::create_dir_all(paths.logs_dir()).unwrap();
        std::fs::write(paths.log_path(), "").unwrap();

        rotate_on_startup(&paths, 3).unwrap();
        assert!(paths.log_path().exists());
        assert_eq!(count_rotated(&paths), 0);
    }

    #[test]
    fn non_empty_current_log_rotates() {
        let home = tempfile::TempDir::new().unwrap();
        let paths = StatePaths::new(home.path());
        std::fs::create_dir_all(paths.logs_dir()).unwrap();
        std::fs::write(paths.log_path(), "previous run\n").unwrap();

        rotate_on_startup(&paths, 3).unwrap();
        assert!(!paths.log_path().exists());
        assert_eq!(count_rotated(&paths), 1);
    }

    #[test]
    fn retention_prunes_oldest() {
        let home = tempfile::TempDir::new().unwrap();
        let paths = StatePaths::new(home.path());
        let dir = paths.logs_dir();
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            std::fs::write(dir.join(format!("blah-code-2026010{i}-000000.log")), "x").unwrap();
        }

        rotate_on_startup(&paths, 2).unwrap();
        assert_eq!(count_rotated(&paths), 2);
        // The newest survive.
        assert!(dir.join("blah-code-20260104-000000.log").exists());
        assert!(dir.join("blah-code-20260103-000000.log").exists());
    }

    fn count_rotated(paths: &StatePaths) -> usize {
        std::fs::read_dir(paths.logs_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().into_string().unwrap_or_default();
                name.starts_with(ROTATED_PREFIX) && name.ends_with(".log")
            })
            .count()
    }
}
