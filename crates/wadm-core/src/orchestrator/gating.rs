//! Action gating as pure functions of [`PipelineState`].

use std::fmt;

use super::InstallRetryPolicy;
use super::state::PipelineState;
use crate::error::PreconditionError;

/// A user-facing action on the update panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Recheck,
    Download,
    Install,
    RestartNow,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Recheck,
        Action::Download,
        Action::Install,
        Action::RestartNow,
    ];

    /// Button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Recheck => "Check again",
            Action::Download => "Download update",
            Action::Install => "Install update",
            Action::RestartNow => "Restart now",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The set of currently enabled actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionSet {
    pub recheck: bool,
    pub download: bool,
    pub install: bool,
    pub restart_now: bool,
}

impl ActionSet {
    pub fn contains(&self, action: Action) -> bool {
        match action {
            Action::Recheck => self.recheck,
            Action::Download => self.download,
            Action::Install => self.install,
            Action::RestartNow => self.restart_now,
        }
    }

    /// Enabled actions in display order
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.contains(*a))
    }
}

impl PipelineState {
    /// Decide whether `action` may run against this state.
    pub fn admit(
        &self,
        action: Action,
        policy: InstallRetryPolicy,
    ) -> Result<(), PreconditionError> {
        if action != Action::RestartNow {
            if let Some(stage) = self.in_flight() {
                return Err(PreconditionError::StageInFlight(stage));
            }
        }

        match action {
            Action::Recheck => Ok(()),
            Action::Download => {
                if !self.update_available() {
                    Err(PreconditionError::NoUpdateAvailable)
                } else if self.artifact_url().is_none() {
                    Err(PreconditionError::MissingArtifactUrl)
                } else if self.download_succeeded() {
                    Err(PreconditionError::AlreadyDownloaded)
                } else {
                    Ok(())
                }
            }
            Action::Install => {
                if !self.update_available() {
                    Err(PreconditionError::NoUpdateAvailable)
                } else if !self.download_succeeded() {
                    Err(PreconditionError::NoSuccessfulDownload)
                } else if self.install_succeeded() {
                    Err(PreconditionError::AlreadyInstalled)
                } else if self.install_failed() && policy == InstallRetryPolicy::Blocked {
                    Err(PreconditionError::InstallRetryBlocked)
                } else {
                    Ok(())
                }
            }
            Action::RestartNow => {
                if self.restart_required() {
                    Ok(())
                } else {
                    Err(PreconditionError::NoRestartRequired)
                }
            }
        }
    }

    pub fn is_enabled(&self, action: Action, policy: InstallRetryPolicy) -> bool {
        self.admit(action, policy).is_ok()
    }

    pub fn enabled_actions(&self, policy: InstallRetryPolicy) -> ActionSet {
        ActionSet {
            recheck: self.is_enabled(Action::Recheck, policy),
            download: self.is_enabled(Action::Download, policy),
            install: self.is_enabled(Action::Install, policy),
            restart_now: self.is_enabled(Action::RestartNow, policy),
        }
    }
}
