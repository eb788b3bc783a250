use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::BranchError;
use crate::normalize::DEFAULT_SIZE_CAP_BYTES;
use crate::retry::RetryPolicy;
use crate::types::ids::is_valid_document_id;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "BRANCH_HOME";

/// Name of the home directory under the user's home
pub const HOME_DIR_NAME: &str = ".branch";

/// Default author identity when a revision carries none
pub const DEFAULT_AUTHOR: &str = "unknown@example.com";

/// Process-wide configuration stored in `<home>/config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Payloads above this size are imported without asset extraction
    pub size_cap_bytes: u64,
    /// Default interval for `branch watch`
    pub watch_interval_secs: u64,
    /// Author used for offline imports without `--author`
    pub default_author: String,
    /// Backoff for transient source failures
    pub retry: RetryPolicy,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            size_cap_bytes: DEFAULT_SIZE_CAP_BYTES,
            watch_interval_secs: 300,
            default_author: DEFAULT_AUTHOR.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Resolve the home directory: explicit override, then `BRANCH_HOME`, then
/// `~/.branch`
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf, BranchError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(env) = std::env::var_os(HOME_ENV) {
        if !env.is_empty() {
            return Ok(PathBuf::from(env));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(HOME_DIR_NAME))
        .ok_or_else(|| {
            BranchError::NotFound(format!(
                "cannot determine home directory; set {} or pass --home",
                HOME_ENV
            ))
        })
}

/// Path of the config file inside a home directory
pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Load config from `<home>/config.toml`
pub fn load_config(home: &Path) -> Result<Option<BranchConfig>, BranchError> {
    let path = config_path(home);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let config: BranchConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config to `<home>/config.toml`
pub fn save_config(home: &Path, config: &BranchConfig) -> Result<(), BranchError> {
    std::fs::create_dir_all(home)?;
    let content = toml::to_string_pretty(config)?;
    write_atomic(&config_path(home), content.as_bytes())?;
    Ok(())
}

/// Load the config, writing the defaults on first use
pub fn load_or_create_config(home: &Path) -> Result<BranchConfig, BranchError> {
    if let Some(config) = load_config(home)? {
        return Ok(config);
    }
    let config = BranchConfig::default();
    save_config(home, &config)?;
    debug!(path = %config_path(home).display(), "wrote default config");
    Ok(config)
}

/// Get the directory holding all per-document records
pub fn documents_dir(home: &Path) -> PathBuf {
    home.join("documents")
}

/// Get the record directory for one document
pub fn document_dir(home: &Path, document_id: &str) -> Result<PathBuf, BranchError> {
    if !is_valid_document_id(document_id) {
        return Err(BranchError::InvalidArgs(format!(
            "invalid document id '{}': only letters, digits, '_', '-' and '.' are allowed",
            document_id
        )));
    }
    Ok(documents_dir(home).join(document_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let config = BranchConfig {
            size_cap_bytes: 1024,
            watch_interval_secs: 60,
            default_author: "me@example.com".to_string(),
            retry: RetryPolicy::immediate(2),
        };

        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("home");

        let config = load_or_create_config(&home).unwrap();

        assert_eq!(config, BranchConfig::default());
        assert!(config_path(&home).exists());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            config_path(dir.path()),
            "size_cap_bytes = 2048\n[retry]\nmax_attempts = 7\n",
        )
        .unwrap();

        let config = load_config(dir.path()).unwrap().unwrap();

        assert_eq!(config.size_cap_bytes, 2048);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.default_author, DEFAULT_AUTHOR);
    }

    #[test]
    fn test_explicit_home_wins() {
        let dir = tempdir().unwrap();
        assert_eq!(resolve_home(Some(dir.path())).unwrap(), dir.path());
    }

    #[test]
    fn test_document_dir_rejects_path_tricks() {
        let dir = tempdir().unwrap();
        assert!(document_dir(dir.path(), "abc123").is_ok());
        assert!(matches!(
            document_dir(dir.path(), "../escape"),
            Err(BranchError::InvalidArgs(_))
        ));
    }
}
