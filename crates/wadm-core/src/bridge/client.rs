//! HTTP client for the local backend bridge.
//!
//! Commands are invoked by name with a JSON object of named arguments:
//!
//! ```text
//! POST {base_url}/invoke/{command}    body: {"updateUrl": "..."}
//! 2xx  -> JSON result value
//! else -> error message text
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use wadm_core::bridge::{BridgeClient, UpdateService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BridgeClient::new("http://127.0.0.1:7878")?;
//!     let result = client.check_for_updates().await?;
//!     println!("latest: {}", result.latest_version);
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::UpdateService;
use crate::error::{Error, Operation, Result, UpdateServiceError};
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult};

/// Default address of the backend bridge
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:7878";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Client for the backend bridge
#[derive(Clone)]
pub struct BridgeClient {
    /// Base URL, without trailing slash
    base_url: String,
    /// Bearer token forwarded to the backend
    token: Option<String>,
    /// Timeout for short calls (check, restart)
    timeout: Duration,
    /// Timeout for download and install
    transfer_timeout: Duration,
    /// HTTP client
    client: reqwest::Client,
}

impl BridgeClient {
    /// Create a client for the bridge at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("wadm/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            client,
        })
    }

    /// Set the authentication token
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Read the authentication token from a file, if it exists
    pub fn with_token_file(mut self, path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(t) => self.token = Some(t.trim().to_string()),
                Err(e) => warn!("Failed to read bridge token: {}", e),
            }
        }
        self
    }

    /// Set request timeouts for short calls and for download/install
    pub fn with_timeouts(mut self, timeout: Duration, transfer_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.transfer_timeout = transfer_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the backend answers at all
    pub async fn health(&self) -> std::result::Result<(), UpdateServiceError> {
        let url = format!("{}/health", self.base_url);
        debug!("Bridge health probe: {}", url);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UpdateServiceError::Unreachable(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(UpdateServiceError::Unreachable(format!(
                "health probe returned {}",
                resp.status()
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command Invocation
    // ─────────────────────────────────────────────────────────────────────────

    fn timeout_for(&self, operation: Operation) -> Duration {
        match operation {
            Operation::DownloadUpdate | Operation::InstallUpdate => self.transfer_timeout,
            Operation::CheckForUpdates | Operation::RestartApplication => self.timeout,
        }
    }

    async fn send(
        &self,
        operation: Operation,
        args: Value,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/invoke/{}", self.base_url, operation.command());
        debug!("Bridge request: {} {}", operation, url);

        let mut req = self
            .client
            .post(&url)
            .timeout(self.timeout_for(operation))
            .json(&args);

        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        req.send().await
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        operation: Operation,
        args: Value,
    ) -> std::result::Result<T, UpdateServiceError> {
        let resp = self
            .send(operation, args)
            .await
            .map_err(|e| UpdateServiceError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            let message = if message.trim().is_empty() {
                format!("backend returned {}", status)
            } else {
                message.trim().to_string()
            };
            return Err(UpdateServiceError::failed(operation, message));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| UpdateServiceError::Unreachable(e.to_string()))?;
        serde_json::from_slice(&body)
            .map_err(|e| UpdateServiceError::malformed(operation, e.to_string()))
    }
}

#[async_trait]
impl UpdateService for BridgeClient {
    async fn check_for_updates(
        &self,
    ) -> std::result::Result<UpdateCheckResult, UpdateServiceError> {
        self.invoke(Operation::CheckForUpdates, json!({})).await
    }

    async fn download_update(
        &self,
        artifact_url: &str,
    ) -> std::result::Result<DownloadResult, UpdateServiceError> {
        self.invoke(Operation::DownloadUpdate, json!({ "updateUrl": artifact_url }))
            .await
    }

    async fn install_update(
        &self,
        artifact_path: &str,
    ) -> std::result::Result<InstallResult, UpdateServiceError> {
        self.invoke(Operation::InstallUpdate, json!({ "filePath": artifact_path }))
            .await
    }

    async fn restart_application(&self) -> std::result::Result<(), UpdateServiceError> {
        let operation = Operation::RestartApplication;
        let resp = match self.send(operation, json!({})).await {
            Ok(resp) => resp,
            // The backend may tear the connection down while restarting us.
            Err(e) if !e.is_connect() && !e.is_timeout() => {
                debug!("Connection closed during restart request: {}", e);
                return Ok(());
            }
            Err(e) => return Err(UpdateServiceError::Unreachable(e.to_string())),
        };

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = resp.text().await.unwrap_or_default();
            Err(UpdateServiceError::failed(
                operation,
                format!("backend returned {}: {}", status, message.trim()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = BridgeClient::new("http://127.0.0.1:7878/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:7878");
    }

    #[test]
    fn test_transfer_operations_use_long_timeout() {
        let client = BridgeClient::new(DEFAULT_BRIDGE_URL)
            .unwrap()
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(600));

        assert_eq!(
            client.timeout_for(Operation::CheckForUpdates),
            Duration::from_secs(5)
        );
        assert_eq!(
            client.timeout_for(Operation::RestartApplication),
            Duration::from_secs(5)
        );
        assert_eq!(
            client.timeout_for(Operation::DownloadUpdate),
            Duration::from_secs(600)
        );
        assert_eq!(
            client.timeout_for(Operation::InstallUpdate),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_missing_token_file_is_ignored() {
        let client = BridgeClient::new(DEFAULT_BRIDGE_URL)
            .unwrap()
            .with_token_file(Path::new("/nonexistent/wadm/bridge-token"));
        assert!(client.token.is_none());
    }
}
