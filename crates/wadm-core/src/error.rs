//! Error types for wadm-core.

use std::fmt;

use thiserror::Error;

use crate::orchestrator::Stage;

/// Result type alias using wadm-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// A named operation on the backend update service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CheckForUpdates,
    DownloadUpdate,
    InstallUpdate,
    RestartApplication,
}

impl Operation {
    /// Command name understood by the backend bridge.
    pub fn command(&self) -> &'static str {
        match self {
            Operation::CheckForUpdates => "check_for_updates",
            Operation::DownloadUpdate => "download_update",
            Operation::InstallUpdate => "install_update",
            Operation::RestartApplication => "restart_app",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CheckForUpdates => "check-for-updates",
            Operation::DownloadUpdate => "download-update",
            Operation::InstallUpdate => "install-update",
            Operation::RestartApplication => "restart-application",
        })
    }
}

/// Failure of a call into the external update service.
///
/// Cloneable so it can live in published pipeline snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateServiceError {
    /// The backend process could not be reached at all.
    #[error("Update service unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with an error.
    #[error("{operation} failed: {message}")]
    Failed { operation: Operation, message: String },

    /// The backend answered, but the payload could not be used.
    #[error("Malformed response from {operation}: {message}")]
    Malformed { operation: Operation, message: String },
}

impl UpdateServiceError {
    /// Create a backend failure for an operation
    pub fn failed(operation: Operation, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }

    /// Create a malformed-data failure for an operation
    pub fn malformed(operation: Operation, message: impl Into<String>) -> Self {
        Self::Malformed {
            operation,
            message: message.into(),
        }
    }
}

/// An action was invoked out of order.
///
/// Unreachable when callers respect the gating rules; seeing one is a bug in
/// the caller, not a retryable condition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("{0} stage is already in flight")]
    StageInFlight(Stage),

    #[error("No update is available to download")]
    NoUpdateAvailable,

    #[error("Update metadata carries no artifact URL")]
    MissingArtifactUrl,

    #[error("Update has already been downloaded")]
    AlreadyDownloaded,

    #[error("No successful download to install")]
    NoSuccessfulDownload,

    #[error("Update has already been installed")]
    AlreadyInstalled,

    #[error("Install retry is blocked after a failed install")]
    InstallRetryBlocked,

    #[error("Installed update does not require a restart")]
    NoRestartRequired,
}

/// Core error types for wadm operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    UpdateService(#[from] UpdateServiceError),

    #[error("Action invoked out of order: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Update orchestrator is no longer running")]
    OrchestratorClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_command_names() {
        assert_eq!(Operation::CheckForUpdates.command(), "check_for_updates");
        assert_eq!(Operation::DownloadUpdate.command(), "download_update");
        assert_eq!(Operation::InstallUpdate.command(), "install_update");
        assert_eq!(Operation::RestartApplication.command(), "restart_app");
    }

    #[test]
    fn test_service_error_display() {
        let err = UpdateServiceError::failed(Operation::InstallUpdate, "access denied");
        assert_eq!(err.to_string(), "install-update failed: access denied");

        let err = UpdateServiceError::malformed(Operation::CheckForUpdates, "missing field");
        assert_eq!(
            err.to_string(),
            "Malformed response from check-for-updates: missing field"
        );
    }

    #[test]
    fn test_precondition_wraps_into_error() {
        let err: Error = PreconditionError::StageInFlight(Stage::Download).into();
        assert!(matches!(
            err,
            Error::Precondition(PreconditionError::StageInFlight(Stage::Download))
        ));
        assert_eq!(
            err.to_string(),
            "Action invoked out of order: download stage is already in flight"
        );
    }
}
