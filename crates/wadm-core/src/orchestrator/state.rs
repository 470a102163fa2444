//! Pipeline state owned by the orchestrator.
//!
//! Snapshots of [`PipelineState`] are published to readers; only the
//! orchestrator's event loop calls the `pub(crate)` transition methods.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::UpdateServiceError;
use crate::restart::{RestartOutcome, RestartTrigger};
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult};

/// One of the three service-backed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Check,
    Download,
    Install,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Check => "check",
            Stage::Download => "download",
            Stage::Install => "install",
        })
    }
}

/// The stage currently waiting on the update service, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveStage {
    #[default]
    None,
    Checking,
    Downloading,
    Installing,
}

/// Where the pipeline stands, as recorded by stage transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Before any check is dispatched. [`PipelineState::new`] starts at
    /// `Checking` because the first check is automatic, so published
    /// snapshots never sit here.
    Idle,
    Checking,
    CheckFailed,
    Checked,
    Downloading,
    DownloadFailed,
    Downloaded,
    Installing,
    InstallFailed,
    Installed,
}

impl Position {
    pub fn active_stage(&self) -> ActiveStage {
        match self {
            Position::Checking => ActiveStage::Checking,
            Position::Downloading => ActiveStage::Downloading,
            Position::Installing => ActiveStage::Installing,
            _ => ActiveStage::None,
        }
    }

    pub fn in_flight(&self) -> Option<Stage> {
        match self {
            Position::Checking => Some(Stage::Check),
            Position::Downloading => Some(Stage::Download),
            Position::Installing => Some(Stage::Install),
            _ => None,
        }
    }
}

/// Full lifecycle phase: the pipeline position with the restart overlaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mirrors [`Position::Idle`]
    Idle,
    Checking,
    CheckFailed,
    Checked,
    Downloading,
    DownloadFailed,
    Downloaded,
    Installing,
    InstallFailed,
    Installed,
    RestartPending,
    Restarted,
}

/// Latest result and latest error of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSlot<T> {
    result: Option<T>,
    error: Option<UpdateServiceError>,
    completed_at: Option<DateTime<Utc>>,
}

impl<T> Default for StageSlot<T> {
    fn default() -> Self {
        Self {
            result: None,
            error: None,
            completed_at: None,
        }
    }
}

impl<T> StageSlot<T> {
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&UpdateServiceError> {
        self.error.as_ref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether the stage has ever produced a result or an error.
    pub fn attempted(&self) -> bool {
        self.completed_at.is_some()
    }

    fn clear_error(&mut self) {
        self.error = None;
    }

    /// A new result replaces the previous one; an error leaves it in place.
    fn record(&mut self, outcome: Result<T, UpdateServiceError>) {
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.error = None;
            }
            Err(error) => self.error = Some(error),
        }
        self.completed_at = Some(Utc::now());
    }
}

/// Restart overlay of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RestartStatus {
    NotScheduled,
    Pending {
        deadline: DateTime<Utc>,
    },
    Requested {
        trigger: RestartTrigger,
        at: DateTime<Utc>,
    },
    Failed {
        error: UpdateServiceError,
    },
}

/// Aggregate view of one update run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    run_id: Uuid,
    position: Position,
    check: StageSlot<UpdateCheckResult>,
    download: StageSlot<DownloadResult>,
    install: StageSlot<InstallResult>,
    restart: RestartStatus,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    /// Fresh state; the first check is always already under way.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            position: Position::Checking,
            check: StageSlot::default(),
            download: StageSlot::default(),
            install: StageSlot::default(),
            restart: RestartStatus::NotScheduled,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn active_stage(&self) -> ActiveStage {
        self.position.active_stage()
    }

    pub fn in_flight(&self) -> Option<Stage> {
        self.position.in_flight()
    }

    pub fn check(&self) -> &StageSlot<UpdateCheckResult> {
        &self.check
    }

    pub fn download(&self) -> &StageSlot<DownloadResult> {
        &self.download
    }

    pub fn install(&self) -> &StageSlot<InstallResult> {
        &self.install
    }

    pub fn restart(&self) -> &RestartStatus {
        &self.restart
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight().is_none() {
            match self.restart {
                RestartStatus::Requested { .. } => return Phase::Restarted,
                RestartStatus::Pending { .. } => return Phase::RestartPending,
                RestartStatus::NotScheduled | RestartStatus::Failed { .. } => {}
            }
        }

        match self.position {
            Position::Idle => Phase::Idle,
            Position::Checking => Phase::Checking,
            Position::CheckFailed => Phase::CheckFailed,
            Position::Checked => Phase::Checked,
            Position::Downloading => Phase::Downloading,
            Position::DownloadFailed => Phase::DownloadFailed,
            Position::Downloaded => Phase::Downloaded,
            Position::Installing => Phase::Installing,
            Position::InstallFailed => Phase::InstallFailed,
            Position::Installed => Phase::Installed,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived facts used by gating
    // ─────────────────────────────────────────────────────────────────────────

    /// The latest check found an update.
    ///
    /// A failed check found nothing, even while an earlier result is kept.
    pub fn update_available(&self) -> bool {
        self.check.error().is_none() && self.check.result().is_some_and(|r| r.update_available)
    }

    /// Artifact URL from the latest check, if usable.
    pub fn artifact_url(&self) -> Option<&str> {
        self.check.result().and_then(|r| r.artifact_url())
    }

    /// Artifact path from the latest download, if it succeeded.
    pub fn artifact_path(&self) -> Option<&str> {
        self.download.result().and_then(|r| r.artifact_path())
    }

    pub fn download_succeeded(&self) -> bool {
        self.artifact_path().is_some()
    }

    pub fn install_succeeded(&self) -> bool {
        self.install.result().is_some_and(|r| r.success)
    }

    /// Latest install attempt ended in an error or an unsuccessful result.
    pub fn install_failed(&self) -> bool {
        self.install.error().is_some() || self.install.result().is_some_and(|r| !r.success)
    }

    pub fn restart_required(&self) -> bool {
        self.install.result().is_some_and(|r| r.needs_restart())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark `stage` in flight, clearing only that stage's error.
    pub(crate) fn enter(&mut self, stage: Stage) {
        match stage {
            Stage::Check => {
                self.check.clear_error();
                self.position = Position::Checking;
            }
            Stage::Download => {
                self.download.clear_error();
                self.position = Position::Downloading;
            }
            Stage::Install => {
                self.install.clear_error();
                self.position = Position::Installing;
            }
        }
    }

    pub(crate) fn record_check(&mut self, outcome: Result<UpdateCheckResult, UpdateServiceError>) {
        self.position = if outcome.is_ok() {
            Position::Checked
        } else {
            Position::CheckFailed
        };
        self.check.record(outcome);
    }

    pub(crate) fn record_download(&mut self, outcome: Result<DownloadResult, UpdateServiceError>) {
        self.position = match &outcome {
            Ok(result) if result.success => Position::Downloaded,
            _ => Position::DownloadFailed,
        };
        self.download.record(outcome);
    }

    pub(crate) fn record_install(&mut self, outcome: Result<InstallResult, UpdateServiceError>) {
        self.position = match &outcome {
            Ok(result) if result.success => Position::Installed,
            _ => Position::InstallFailed,
        };
        self.install.record(outcome);
    }

    pub(crate) fn schedule_restart(&mut self, deadline: DateTime<Utc>) {
        self.restart = RestartStatus::Pending { deadline };
    }

    pub(crate) fn record_restart(&mut self, outcome: RestartOutcome) {
        match outcome {
            RestartOutcome::Issued { trigger } => {
                self.restart = RestartStatus::Requested {
                    trigger,
                    at: Utc::now(),
                };
            }
            RestartOutcome::AlreadyIssued => {}
            RestartOutcome::Failed(error) => {
                self.restart = RestartStatus::Failed { error };
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::types::UpdateInfo;

    pub(crate) fn available(url: &str) -> UpdateCheckResult {
        UpdateCheckResult::available(
            "1.0.0",
            UpdateInfo {
                version: "1.1.0".to_string(),
                artifact_url: url.to_string(),
                release_date: Utc::now(),
                description: "Maintenance release".to_string(),
                is_critical: false,
                size_mb: 15.2,
                changes: vec!["Fixes".to_string()],
            },
        )
    }

    pub(crate) fn downloaded(path: &str) -> DownloadResult {
        DownloadResult {
            success: true,
            artifact_path: path.to_string(),
            message: "Downloaded".to_string(),
        }
    }

    pub(crate) fn installed(restart_required: bool) -> InstallResult {
        InstallResult {
            success: true,
            message: "Installed".to_string(),
            restart_required,
        }
    }

    fn service_error(operation: Operation) -> UpdateServiceError {
        UpdateServiceError::failed(operation, "backend crashed")
    }

    #[test]
    fn test_new_state_is_checking() {
        let state = PipelineState::new();
        assert_eq!(state.active_stage(), ActiveStage::Checking);
        assert_eq!(state.phase(), Phase::Checking);
        assert!(!state.check().attempted());
        assert_eq!(state.restart(), &RestartStatus::NotScheduled);
    }

    #[test]
    fn test_idle_is_settled_and_not_a_starting_point() {
        assert_eq!(Position::Idle.active_stage(), ActiveStage::None);
        assert_eq!(Position::Idle.in_flight(), None);
        assert_ne!(PipelineState::new().position(), Position::Idle);
    }

    #[test]
    fn test_enter_clears_only_own_error() {
        let mut state = PipelineState::new();
        state.record_check(Err(service_error(Operation::CheckForUpdates)));
        state.record_download(Err(service_error(Operation::DownloadUpdate)));

        state.enter(Stage::Check);
        assert!(state.check().error().is_none());
        assert!(state.download().error().is_some());
        assert_eq!(state.active_stage(), ActiveStage::Checking);
    }

    #[test]
    fn test_second_check_overwrites_first() {
        let mut state = PipelineState::new();
        state.record_check(Ok(available("https://x/y.msi")));
        state.enter(Stage::Check);
        state.record_check(Ok(UpdateCheckResult::up_to_date("1.1.0")));

        let result = state.check().result().unwrap();
        assert!(!result.update_available);
        assert!(result.update_info.is_none());
        assert_eq!(result.current_version, "1.1.0");
    }

    #[test]
    fn test_failure_keeps_earlier_results() {
        let mut state = PipelineState::new();
        state.record_check(Ok(available("https://x/y.msi")));
        state.enter(Stage::Download);
        state.record_download(Ok(downloaded("/tmp/y.msi")));
        state.enter(Stage::Install);
        state.record_install(Err(service_error(Operation::InstallUpdate)));

        assert_eq!(state.phase(), Phase::InstallFailed);
        assert!(state.install_failed());
        assert!(state.update_available());
        assert_eq!(state.artifact_path(), Some("/tmp/y.msi"));

        state.enter(Stage::Check);
        state.record_check(Err(service_error(Operation::CheckForUpdates)));
        assert_eq!(state.phase(), Phase::CheckFailed);
        assert!(state.check().result().is_some());
        assert!(state.download().result().is_some());
        assert!(!state.update_available());
    }

    #[test]
    fn test_unsuccessful_download_result_is_failed_position() {
        let mut state = PipelineState::new();
        state.record_check(Ok(available("https://x/y.msi")));
        state.enter(Stage::Download);
        state.record_download(Ok(DownloadResult {
            success: false,
            artifact_path: String::new(),
            message: "disk full".to_string(),
        }));

        assert_eq!(state.phase(), Phase::DownloadFailed);
        assert!(!state.download_succeeded());
        assert!(state.download().error().is_none());
    }

    #[test]
    fn test_restart_overlay() {
        let mut state = PipelineState::new();
        state.record_check(Ok(available("https://x/y.msi")));
        state.enter(Stage::Download);
        state.record_download(Ok(downloaded("/tmp/y.msi")));
        state.enter(Stage::Install);
        state.record_install(Ok(installed(true)));
        assert_eq!(state.phase(), Phase::Installed);
        assert!(state.restart_required());

        state.schedule_restart(Utc::now());
        assert_eq!(state.phase(), Phase::RestartPending);

        state.record_restart(RestartOutcome::AlreadyIssued);
        assert_eq!(state.phase(), Phase::RestartPending);

        state.record_restart(RestartOutcome::Issued {
            trigger: RestartTrigger::Deferred,
        });
        assert_eq!(state.phase(), Phase::Restarted);
    }

    #[test]
    fn test_failed_restart_falls_back_to_installed() {
        let mut state = PipelineState::new();
        state.record_install(Ok(installed(true)));
        state.schedule_restart(Utc::now());
        state.record_restart(RestartOutcome::Failed(service_error(
            Operation::RestartApplication,
        )));

        assert_eq!(state.phase(), Phase::Installed);
        assert!(matches!(state.restart(), RestartStatus::Failed { .. }));
    }
}
