//! Bridge to the privileged backend process.
//!
//! The backend exposes its update capability as named commands taking a map
//! of named arguments. [`UpdateService`] is the typed view of those commands;
//! [`BridgeClient`] speaks to the real backend and [`ScriptedUpdateService`]
//! answers from a script (tests, `--simulate`).

#[cfg(feature = "client")]
mod client;
mod scripted;

use async_trait::async_trait;

use crate::error::UpdateServiceError;
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult};

#[cfg(feature = "client")]
pub use client::{BridgeClient, DEFAULT_BRIDGE_URL};
pub use scripted::{RecordedCall, ScriptedUpdateService};

/// The backend's update capability.
///
/// Every method performs exactly one call into the backend. Implementations
/// keep no pipeline state; ordering is the orchestrator's job.
#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Ask whether a newer application version exists.
    async fn check_for_updates(&self) -> Result<UpdateCheckResult, UpdateServiceError>;

    /// Fetch the installer artifact published at `artifact_url`.
    async fn download_update(&self, artifact_url: &str)
    -> Result<DownloadResult, UpdateServiceError>;

    /// Run the installer artifact stored at `artifact_path`.
    async fn install_update(&self, artifact_path: &str)
    -> Result<InstallResult, UpdateServiceError>;

    /// Ask the backend to restart the application.
    ///
    /// On success the hosting process is expected to terminate shortly after.
    async fn restart_application(&self) -> Result<(), UpdateServiceError>;
}
