//! Presentation model for the update panel.
//!
//! [`PanelView::from_state`] is a pure projection of a pipeline snapshot:
//! renderers read it and never touch [`PipelineState`] themselves.

use chrono::{DateTime, Utc};

use crate::orchestrator::{
    ActionSet, ActiveStage, InstallRetryPolicy, Phase, PipelineState, RestartStatus, StageSlot,
};
use crate::restart::RestartTrigger;
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult, UpdateInfo};

/// Step highlighted in the panel's stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PanelStep {
    Check = 0,
    Download = 1,
    Install = 2,
}

impl PanelStep {
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            PanelStep::Check => "Check",
            PanelStep::Download => "Download",
            PanelStep::Install => "Install",
        }
    }
}

/// What one stage's area of the panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageView {
    NotRun,
    InFlight,
    /// The stage's error, shown in place of its summary
    Failed(String),
    /// The stage completed but reported it did not succeed
    Unsuccessful(String),
    Succeeded(String),
}

impl StageView {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, StageView::InFlight)
    }
}

/// Release details of an available update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDetails {
    pub version: String,
    pub release_date: DateTime<Utc>,
    pub description: String,
    pub is_critical: bool,
    pub size_mb: f64,
    pub changes: Vec<String>,
}

impl From<&UpdateInfo> for UpdateDetails {
    fn from(info: &UpdateInfo) -> Self {
        Self {
            version: info.version.clone(),
            release_date: info.release_date,
            description: info.description.clone(),
            is_critical: info.is_critical,
            size_mb: info.size_mb,
            changes: info.changes.clone(),
        }
    }
}

/// Restart notice shown after a restart-requiring install.
#[derive(Debug, Clone, PartialEq)]
pub enum RestartBanner {
    Pending { deadline: DateTime<Utc> },
    Requested { trigger: RestartTrigger },
    Failed(String),
}

/// Everything the update panel renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub phase: Phase,
    pub step: PanelStep,
    pub current_version: Option<String>,
    pub check: StageView,
    pub download: StageView,
    pub install: StageView,
    pub update: Option<UpdateDetails>,
    pub restart: Option<RestartBanner>,
    pub actions: ActionSet,
}

impl PanelView {
    pub fn from_state(state: &PipelineState, policy: InstallRetryPolicy) -> Self {
        let active = state.active_stage();

        let check_result = state.check().result();
        let update = check_result
            .filter(|_| state.update_available())
            .and_then(|r| r.update_info.as_ref())
            .map(UpdateDetails::from);

        let restart = match state.restart() {
            RestartStatus::NotScheduled => None,
            RestartStatus::Pending { deadline } => Some(RestartBanner::Pending {
                deadline: *deadline,
            }),
            RestartStatus::Requested { trigger, .. } => {
                Some(RestartBanner::Requested { trigger: *trigger })
            }
            RestartStatus::Failed { error } => Some(RestartBanner::Failed(error.to_string())),
        };

        Self {
            phase: state.phase(),
            step: step_for(state),
            current_version: check_result.map(|r| r.current_version.clone()),
            check: stage_view(state.check(), active == ActiveStage::Checking, check_summary),
            download: stage_view(
                state.download(),
                active == ActiveStage::Downloading,
                download_summary,
            ),
            install: stage_view(
                state.install(),
                active == ActiveStage::Installing,
                install_summary,
            ),
            update,
            restart,
            actions: state.enabled_actions(policy),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.check.is_in_flight() || self.download.is_in_flight() || self.install.is_in_flight()
    }
}

fn step_for(state: &PipelineState) -> PanelStep {
    if state.download_succeeded() || state.install().attempted() {
        PanelStep::Install
    } else if state.update_available() {
        PanelStep::Download
    } else {
        PanelStep::Check
    }
}

fn stage_view<T>(
    slot: &StageSlot<T>,
    in_flight: bool,
    summarize: fn(&T) -> Result<String, String>,
) -> StageView {
    if in_flight {
        return StageView::InFlight;
    }
    if let Some(error) = slot.error() {
        return StageView::Failed(error.to_string());
    }
    match slot.result().map(summarize) {
        Some(Ok(summary)) => StageView::Succeeded(summary),
        Some(Err(summary)) => StageView::Unsuccessful(summary),
        None => StageView::NotRun,
    }
}

fn check_summary(result: &UpdateCheckResult) -> Result<String, String> {
    if result.update_available {
        Ok(format!(
            "Version {} is available (installed: {})",
            result.latest_version, result.current_version
        ))
    } else {
        Ok(format!(
            "You are running the latest version ({})",
            result.current_version
        ))
    }
}

fn download_summary(result: &DownloadResult) -> Result<String, String> {
    if result.success {
        Ok(format!("Update downloaded to {}", result.artifact_path))
    } else if result.message.is_empty() {
        Err("Download did not complete".to_string())
    } else {
        Err(result.message.clone())
    }
}

fn install_summary(result: &InstallResult) -> Result<String, String> {
    let message = if result.message.is_empty() {
        None
    } else {
        Some(result.message.clone())
    };
    match (result.success, result.restart_required) {
        (true, true) => Ok(message.unwrap_or_else(|| {
            "Update installed, the application will restart".to_string()
        })),
        (true, false) => Ok(message.unwrap_or_else(|| "Update installed".to_string())),
        (false, _) => Err(message.unwrap_or_else(|| "Installation did not complete".to_string())),
    }
}
