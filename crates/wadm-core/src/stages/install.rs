//! Install stage.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bridge::UpdateService;
use crate::error::UpdateServiceError;
use crate::types::InstallResult;

/// Asks the update service to run a downloaded installer.
///
/// Not safe to repeat blindly: re-running an installer over a partially
/// applied update is up to the backend.
#[derive(Clone)]
pub struct InstallStage {
    service: Arc<dyn UpdateService>,
}

impl InstallStage {
    pub fn new(service: Arc<dyn UpdateService>) -> Self {
        Self { service }
    }

    /// Apply the artifact stored at `artifact_path`.
    pub async fn install(&self, artifact_path: &str) -> Result<InstallResult, UpdateServiceError> {
        info!(path = %artifact_path, "Installing update");
        let result = self.service.install_update(artifact_path).await?;

        if result.success {
            info!(
                restart_required = result.restart_required,
                "Update installed"
            );
        } else {
            warn!("Installer reported failure: {}", result.message);
        }
        Ok(result)
    }
}
