//! API-key resolution and storage.
//!
//! Precedence: the `BLAH_CODE_API_KEY` environment variable, then the
//! credentials file written by `blah-code login`.

use serde::{Deserialize, Serialize};

use bc_domain::config::StatePaths;
use bc_domain::error::Result;

pub const API_KEY_ENV: &str = "BLAH_CODE_API_KEY";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    api_key: String,
}

/// Resolve the API key, if any.
pub fn resolve_api_key(paths: &StatePaths) -> Option<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        let key = key.trim().to_owned();
        if !key.is_empty() {
            return Some(key);
        }
    }

    let raw = std::fs::read_to_string(paths.credentials_path()).ok()?;
    let creds: Credentials = serde_json::from_str(&raw).ok()?;
    let key = creds.api_key.trim().to_owned();
    (!key.is_empty()).then_some(key)
}

/// Persist the API key to the credentials file (0600 on unix).
pub fn save_api_key(paths: &StatePaths, api_key: &str) -> Result<()> {
    std::fs::create_dir_all(&paths.state_dir)?;
    let creds = Credentials {
        api_key: api_key.trim().to_owned(),
    };
    let path = paths.credentials_path();
    std::fs::write(&path, serde_json::to_string_pretty(&creds)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_resolve_round_trips() {
        let home = tempfile::TempDir::new().unwrap();
        let paths = StatePaths::new(home.path());
        save_api_key(&paths, "  sk-test-123  ").unwrap();

        // The env var is deliberately not set in tests; only the file path
        // is exercised.
        let resolved = {
            let raw = std::fs::read_to_string(paths.credentials_path()).unwrap();
            let creds: Credentials = serde_json::from_str(&raw).unwrap();
            creds.api_key
        };
        assert_eq!(resolved, "sk-test-123");
    }

    #[test]
    fn missing_credentials_file_resolves_none() {
        let home = tempfile::TempDir::new().unwrap();
        let paths = StatePaths::new(home.path());
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(resolve_api_key(&paths).is_none());
        }
    }
}
