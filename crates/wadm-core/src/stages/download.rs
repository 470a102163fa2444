//! Download stage.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bridge::UpdateService;
use crate::error::UpdateServiceError;
use crate::types::DownloadResult;

/// Asks the update service to fetch an installer artifact.
#[derive(Clone)]
pub struct DownloadStage {
    service: Arc<dyn UpdateService>,
}

impl DownloadStage {
    pub fn new(service: Arc<dyn UpdateService>) -> Self {
        Self { service }
    }

    /// Fetch the artifact published at `artifact_url`.
    pub async fn download(&self, artifact_url: &str) -> Result<DownloadResult, UpdateServiceError> {
        info!(url = %artifact_url, "Downloading update");
        let result = self.service.download_update(artifact_url).await?;
        result.validate()?;

        if result.success {
            info!(path = %result.artifact_path, "Update downloaded");
        } else {
            warn!("Download reported failure: {}", result.message);
        }
        Ok(result)
    }
}
