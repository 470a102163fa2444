//! Configuration management for wadm.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (WADM_BRIDGE_URL, WADM_BRIDGE_TOKEN)
//! 2. Config file (WADM_CONFIG, or config.toml in the data directory)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use wadm_core::bridge::{BridgeClient, DEFAULT_BRIDGE_URL};
use wadm_core::orchestrator::{InstallRetryPolicy, OrchestratorConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Update pipeline settings
    #[serde(default)]
    pub updater: UpdaterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the backend bridge
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Bearer token for the bridge
    pub token: Option<String>,

    /// File holding the bearer token, read when `token` is unset
    pub token_file: Option<PathBuf>,

    /// Timeout for check and restart calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for download and install calls
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Seconds between a restart-requiring install and the automatic restart
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// Whether Install stays available after a failed install
    #[serde(default)]
    pub install_retry: InstallRetryPolicy,
}

// Default value functions
fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_transfer_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_restart_delay_secs() -> u64 {
    3
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "wadm", "wadm") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wadm")
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            token: None,
            token_file: None,
            timeout_secs: default_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            restart_delay_secs: default_restart_delay_secs(),
            install_retry: InstallRetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Apply environment overrides, looked up through `var`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("WADM_BRIDGE_URL") {
            self.bridge.url = url;
        }
        if let Some(token) = var("WADM_BRIDGE_TOKEN") {
            self.bridge.token = Some(token);
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("WADM_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Orchestrator settings derived from the `[updater]` section
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            restart_delay: Duration::from_secs(self.updater.restart_delay_secs),
            install_retry: self.updater.install_retry,
        }
    }

    /// Build a client for the configured backend bridge.
    pub fn bridge_client(&self) -> Result<BridgeClient> {
        let client = BridgeClient::new(&self.bridge.url)
            .context("Failed to create bridge client")?
            .with_timeouts(
                Duration::from_secs(self.bridge.timeout_secs),
                Duration::from_secs(self.bridge.transfer_timeout_secs),
            );

        Ok(match (&self.bridge.token, &self.bridge.token_file) {
            (Some(token), _) => client.with_token(token.clone()),
            (None, Some(path)) => client.with_token_file(path),
            (None, None) => client,
        })
    }

    /// Whether any bridge credential is configured
    pub fn has_token(&self) -> bool {
        self.bridge.token.is_some() || self.bridge.token_file.as_deref().is_some_and(Path::exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.bridge.url, DEFAULT_BRIDGE_URL);
        assert_eq!(config.bridge.timeout_secs, 30);
        assert_eq!(config.bridge.transfer_timeout_secs, 1800);
        assert!(config.bridge.token.is_none());

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.restart_delay, Duration::from_secs(3));
        assert_eq!(orchestrator.install_retry, InstallRetryPolicy::ReuseArtifact);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[bridge]
url = "http://127.0.0.1:9000"

[updater]
restart_delay_secs = 10
install_retry = "blocked"
"#,
        )
        .expect("Failed to write config");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config.bridge.url, "http://127.0.0.1:9000");
        assert_eq!(config.bridge.timeout_secs, 30);
        assert_eq!(config.updater.restart_delay_secs, 10);
        assert_eq!(config.updater.install_retry, InstallRetryPolicy::Blocked);
    }

    #[test]
    fn test_load_nonexistent_uses_defaults() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&temp.path().join("missing.toml"))
            .expect("Failed to load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[updater]\ninstall_retry = \"sometimes\"\n")
            .expect("Failed to write config");

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("WADM_BRIDGE_URL", "http://10.0.0.5:7878"),
            ("WADM_BRIDGE_TOKEN", "s3cret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bridge.url, "http://10.0.0.5:7878");
        assert_eq!(config.bridge.token.as_deref(), Some("s3cret"));
        assert!(config.has_token());
    }

    #[test]
    fn test_token_file_presence() {
        let temp = tempdir().expect("Failed to create temp dir");
        let token_file = temp.path().join("bridge-token");

        let mut config = Config::default();
        config.bridge.token_file = Some(token_file.clone());
        assert!(!config.has_token());

        std::fs::write(&token_file, "abc\n").expect("Failed to write token");
        assert!(config.has_token());
        assert!(config.bridge_client().is_ok());
    }
}
