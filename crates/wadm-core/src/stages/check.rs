//! Version check stage.

use std::sync::Arc;

use tracing::{debug, info};

use crate::bridge::UpdateService;
use crate::error::UpdateServiceError;
use crate::types::UpdateCheckResult;

/// Asks the update service whether a newer version exists.
#[derive(Clone)]
pub struct VersionCheckStage {
    service: Arc<dyn UpdateService>,
}

impl VersionCheckStage {
    pub fn new(service: Arc<dyn UpdateService>) -> Self {
        Self { service }
    }

    /// Run one version check.
    ///
    /// Safe to repeat at any time; every call yields an independent result.
    pub async fn check(&self) -> Result<UpdateCheckResult, UpdateServiceError> {
        debug!("Checking for updates");
        let result = self.service.check_for_updates().await?;
        result.validate()?;

        if result.update_available {
            info!(
                current = %result.current_version,
                latest = %result.latest_version,
                "Update available"
            );
        } else {
            info!(current = %result.current_version, "Application is up to date");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ScriptedUpdateService;
    use crate::error::Operation;

    #[tokio::test]
    async fn test_check_passes_through_result() {
        let service = Arc::new(ScriptedUpdateService::new());
        service.push_check(Ok(UpdateCheckResult::up_to_date("1.0.0")));

        let stage = VersionCheckStage::new(service.clone());
        let result = stage.check().await.unwrap();
        assert_eq!(result.current_version, "1.0.0");
        assert!(result.update_info.is_none());
    }

    #[tokio::test]
    async fn test_check_rejects_inconsistent_result() {
        let service = Arc::new(ScriptedUpdateService::new());
        let mut broken = UpdateCheckResult::up_to_date("1.0.0");
        broken.update_available = true;
        service.push_check(Ok(broken));

        let err = VersionCheckStage::new(service).check().await.unwrap_err();
        assert!(matches!(
            err,
            UpdateServiceError::Malformed {
                operation: Operation::CheckForUpdates,
                ..
            }
        ));
    }
}
