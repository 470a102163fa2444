//! Update pipeline data model.
//!
//! These types travel over the backend bridge and into pipeline snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Operation, UpdateServiceError};

// ─────────────────────────────────────────────────────────────────────────────
// Stage Results
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata describing an available update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub version: String,
    #[serde(alias = "url", alias = "download_url")]
    pub artifact_url: String,
    #[serde(deserialize_with = "release_date::deserialize")]
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_critical: bool,
    pub size_mb: f64,
    #[serde(default)]
    pub changes: Vec<String>,
}

/// Outcome of one version check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCheckResult {
    pub update_available: bool,
    pub current_version: String,
    pub latest_version: String,
    #[serde(default)]
    pub update_info: Option<UpdateInfo>,
}

impl UpdateCheckResult {
    /// Result for an up-to-date installation.
    pub fn up_to_date(current_version: impl Into<String>) -> Self {
        let current_version = current_version.into();
        Self {
            update_available: false,
            latest_version: current_version.clone(),
            current_version,
            update_info: None,
        }
    }

    /// Result announcing `info` as a newer release.
    pub fn available(current_version: impl Into<String>, info: UpdateInfo) -> Self {
        Self {
            update_available: true,
            current_version: current_version.into(),
            latest_version: info.version.clone(),
            update_info: Some(info),
        }
    }

    /// Artifact URL of the announced update, if one is usable.
    pub fn artifact_url(&self) -> Option<&str> {
        self.update_info
            .as_ref()
            .filter(|_| self.update_available)
            .map(|info| info.artifact_url.as_str())
            .filter(|url| !url.trim().is_empty())
    }

    /// Check that `update_info` is present exactly when an update is available.
    pub fn validate(&self) -> Result<(), UpdateServiceError> {
        match (self.update_available, self.update_info.is_some()) {
            (true, false) => Err(UpdateServiceError::malformed(
                Operation::CheckForUpdates,
                "update_available is set but update_info is missing",
            )),
            (false, true) => Err(UpdateServiceError::malformed(
                Operation::CheckForUpdates,
                "update_info is present but no update is available",
            )),
            _ => Ok(()),
        }
    }
}

/// Outcome of one artifact download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    #[serde(alias = "file_path", default)]
    pub artifact_path: String,
    #[serde(default)]
    pub message: String,
}

impl DownloadResult {
    /// Path of the downloaded artifact, only when the download succeeded.
    pub fn artifact_path(&self) -> Option<&str> {
        if self.success && !self.artifact_path.is_empty() {
            Some(&self.artifact_path)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), UpdateServiceError> {
        if self.success && self.artifact_path.trim().is_empty() {
            return Err(UpdateServiceError::malformed(
                Operation::DownloadUpdate,
                "download reported success without an artifact path",
            ));
        }
        Ok(())
    }
}

/// Outcome of one installer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub restart_required: bool,
}

impl InstallResult {
    /// Whether this result should trigger the deferred restart.
    pub fn needs_restart(&self) -> bool {
        self.success && self.restart_required
    }
}

/// Lenient decoding of the backend's release date.
///
/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub mod release_date {
    use super::*;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid release date: {:?}", raw))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn info(url: &str) -> UpdateInfo {
        UpdateInfo {
            version: "1.1.0".to_string(),
            artifact_url: url.to_string(),
            release_date: Utc::now(),
            description: String::new(),
            is_critical: false,
            size_mb: 12.5,
            changes: vec![],
        }
    }

    #[test]
    fn test_decode_backend_field_names() {
        let json = serde_json::json!({
            "update_available": true,
            "current_version": "1.0.0",
            "latest_version": "1.1.0",
            "update_info": {
                "version": "1.1.0",
                "url": "https://updates.example/wadm-1.1.0.msi",
                "release_date": "2025-04-15",
                "description": "Maintenance release",
                "is_critical": true,
                "size_mb": 15.2,
                "changes": ["Faster service list", "Fix event log paging"]
            }
        });

        let result: UpdateCheckResult = serde_json::from_value(json).unwrap();
        assert!(result.validate().is_ok());
        let info = result.update_info.as_ref().unwrap();
        assert_eq!(info.artifact_url, "https://updates.example/wadm-1.1.0.msi");
        assert_eq!(info.release_date.year(), 2025);
        assert_eq!(info.release_date.hour(), 0);
        assert_eq!(info.changes.len(), 2);
        assert!(info.is_critical);
    }

    #[test]
    fn test_decode_download_file_path_alias() {
        let json = serde_json::json!({
            "success": true,
            "file_path": "C:\\Temp\\wadm-1.1.0.msi",
            "message": "done"
        });
        let result: DownloadResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.artifact_path(), Some("C:\\Temp\\wadm-1.1.0.msi"));
    }

    #[test]
    fn test_release_date_formats() {
        assert!(release_date::parse("2025-04-15T10:30:00Z").is_some());
        assert!(release_date::parse("2025-04-15T10:30:00+02:00").is_some());
        assert!(release_date::parse("2025-04-15").is_some());
        assert!(release_date::parse("15/04/2025").is_none());
        assert!(release_date::parse("").is_none());
    }

    #[test]
    fn test_invalid_release_date_is_rejected() {
        let json = serde_json::json!({
            "version": "1.1.0",
            "url": "https://x/y.msi",
            "release_date": "yesterday",
            "size_mb": 1.0
        });
        assert!(serde_json::from_value::<UpdateInfo>(json).is_err());
    }

    #[test]
    fn test_check_result_invariant() {
        assert!(UpdateCheckResult::up_to_date("1.0.0").validate().is_ok());
        assert!(
            UpdateCheckResult::available("1.0.0", info("https://x/y.msi"))
                .validate()
                .is_ok()
        );

        let mut missing = UpdateCheckResult::up_to_date("1.0.0");
        missing.update_available = true;
        assert!(matches!(
            missing.validate(),
            Err(UpdateServiceError::Malformed { .. })
        ));

        let mut stray = UpdateCheckResult::available("1.0.0", info("https://x/y.msi"));
        stray.update_available = false;
        assert!(stray.validate().is_err());
    }

    #[test]
    fn test_artifact_url_requires_non_empty() {
        let result = UpdateCheckResult::available("1.0.0", info("  "));
        assert_eq!(result.artifact_url(), None);

        let result = UpdateCheckResult::available("1.0.0", info("https://x/y.msi"));
        assert_eq!(result.artifact_url(), Some("https://x/y.msi"));
    }

    #[test]
    fn test_download_path_only_on_success() {
        let failed = DownloadResult {
            success: false,
            artifact_path: "/tmp/partial.msi".to_string(),
            message: "checksum mismatch".to_string(),
        };
        assert_eq!(failed.artifact_path(), None);
        assert!(failed.validate().is_ok());

        let empty = DownloadResult {
            success: true,
            artifact_path: String::new(),
            message: String::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_install_needs_restart() {
        let result = InstallResult {
            success: false,
            message: "failed".to_string(),
            restart_required: true,
        };
        assert!(!result.needs_restart());

        let result = InstallResult {
            success: true,
            message: String::new(),
            restart_required: true,
        };
        assert!(result.needs_restart());
    }
}
