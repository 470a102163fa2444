//! Self-update orchestrator.
//!
//! Drives the update pipeline one stage at a time and owns its state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Orchestrator task                          │
//! │                                                                  │
//! │  requests ──▶ gating ──▶ spawn stage call ──┐                    │
//! │                                             ▼                    │
//! │  PipelineState ◀── stage events ◀── Check → Download → Install   │
//! │       │                                          │               │
//! │       │                                RestartCoordinator        │
//! │       ▼                                   (deferred / now)       │
//! │  watch channel ──▶ OrchestratorHandle (snapshot, subscribe)      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state mutation happens on the orchestrator task. Stage calls run in
//! their own tasks and report back as events, so requests arriving while a
//! stage is in flight are answered (and rejected by gating) immediately.

mod gating;
pub(crate) mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::UpdateService;
use crate::error::{Error, PreconditionError, Result, UpdateServiceError};
use crate::restart::{RestartCoordinator, RestartHandle, RestartOutcome};
use crate::stages::{DownloadStage, InstallStage, VersionCheckStage};
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult};

pub use gating::{Action, ActionSet};
pub use state::{
    ActiveStage, Phase, PipelineState, Position, RestartStatus, Stage, StageSlot,
};

/// Observation window between a successful install and the automatic restart.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(3);

const REQUEST_BUFFER: usize = 16;

/// What the Install action does after a failed install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallRetryPolicy {
    /// Allow a manual retry against the artifact already downloaded
    #[default]
    ReuseArtifact,
    /// Keep Install disabled for the rest of the run
    Blocked,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub restart_delay: Duration,
    pub install_retry: InstallRetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
            install_retry: InstallRetryPolicy::default(),
        }
    }
}

enum Request {
    Act {
        action: Action,
        reply: oneshot::Sender<std::result::Result<(), PreconditionError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum StageEvent {
    Checked(std::result::Result<UpdateCheckResult, UpdateServiceError>),
    Downloaded(std::result::Result<DownloadResult, UpdateServiceError>),
    Installed(std::result::Result<InstallResult, UpdateServiceError>),
    Restart(RestartOutcome),
}

/// The update pipeline state machine.
pub struct Orchestrator {
    state: PipelineState,
    config: OrchestratorConfig,
    check: VersionCheckStage,
    download: DownloadStage,
    install: InstallStage,
    restart: RestartCoordinator,
    pending_restart: Option<RestartHandle>,
    requests: mpsc::Receiver<Request>,
    events_tx: mpsc::UnboundedSender<StageEvent>,
    events: mpsc::UnboundedReceiver<StageEvent>,
    published: watch::Sender<PipelineState>,
}

impl Orchestrator {
    /// Start an orchestrator on the current runtime.
    ///
    /// The first version check starts immediately. The orchestrator stops
    /// when [`OrchestratorHandle::shutdown`] is called or every handle is
    /// dropped.
    pub fn spawn(service: Arc<dyn UpdateService>, config: OrchestratorConfig) -> OrchestratorHandle {
        let state = PipelineState::new();
        let run_id = state.run_id();
        let (published, state_rx) = watch::channel(state.clone());
        let (requests_tx, requests) = mpsc::channel(REQUEST_BUFFER);
        let (events_tx, events) = mpsc::unbounded_channel();

        let orchestrator = Self {
            state,
            config,
            check: VersionCheckStage::new(service.clone()),
            download: DownloadStage::new(service.clone()),
            install: InstallStage::new(service.clone()),
            restart: RestartCoordinator::new(service),
            pending_restart: None,
            requests,
            events_tx,
            events,
            published,
        };
        tokio::spawn(orchestrator.run());

        OrchestratorHandle {
            run_id,
            requests: requests_tx,
            state: state_rx,
        }
    }

    async fn run(mut self) {
        info!(run_id = %self.state.run_id(), "Update orchestrator started");
        self.start_check();

        let mut shutdown = None;
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Act { action, reply }) => {
                        let _ = reply.send(self.handle(action));
                    }
                    Some(Request::Shutdown { reply }) => {
                        shutdown = Some(reply);
                        break;
                    }
                    None => break,
                },
                Some(event) = self.events.recv() => self.apply(event),
            }
        }

        self.teardown();
        if let Some(reply) = shutdown {
            let _ = reply.send(());
        }
    }

    fn handle(&mut self, action: Action) -> std::result::Result<(), PreconditionError> {
        if let Err(e) = self.state.admit(action, self.config.install_retry) {
            warn!(run_id = %self.state.run_id(), ?action, "Rejected out-of-order action: {}", e);
            return Err(e);
        }

        match action {
            Action::Recheck => self.start_check(),
            Action::Download => {
                let url = self
                    .state
                    .artifact_url()
                    .map(str::to_owned)
                    .ok_or(PreconditionError::MissingArtifactUrl)?;
                self.start_download(url);
            }
            Action::Install => {
                let path = self
                    .state
                    .artifact_path()
                    .map(str::to_owned)
                    .ok_or(PreconditionError::NoSuccessfulDownload)?;
                self.start_install(path);
            }
            Action::RestartNow => {
                let coordinator = self.restart.clone();
                self.spawn_stage(async move { StageEvent::Restart(coordinator.restart_now().await) });
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage Launch
    // ─────────────────────────────────────────────────────────────────────────

    fn start_check(&mut self) {
        self.state.enter(Stage::Check);
        self.publish();

        let stage = self.check.clone();
        self.spawn_stage(async move { StageEvent::Checked(stage.check().await) });
    }

    fn start_download(&mut self, url: String) {
        self.state.enter(Stage::Download);
        self.publish();

        let stage = self.download.clone();
        self.spawn_stage(async move { StageEvent::Downloaded(stage.download(&url).await) });
    }

    fn start_install(&mut self, path: String) {
        self.state.enter(Stage::Install);
        self.publish();

        let stage = self.install.clone();
        self.spawn_stage(async move { StageEvent::Installed(stage.install(&path).await) });
    }

    fn spawn_stage<F>(&self, call: F)
    where
        F: Future<Output = StageEvent> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            // The orchestrator may be gone by the time the call resolves.
            let _ = events.send(call.await);
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage Completion
    // ─────────────────────────────────────────────────────────────────────────

    fn apply(&mut self, event: StageEvent) {
        let run_id = self.state.run_id();
        match event {
            StageEvent::Checked(outcome) => {
                if let Err(ref e) = outcome {
                    warn!(%run_id, "Version check failed: {}", e);
                }
                self.state.record_check(outcome);
            }
            StageEvent::Downloaded(outcome) => {
                if let Err(ref e) = outcome {
                    warn!(%run_id, "Download failed: {}", e);
                }
                self.state.record_download(outcome);
            }
            StageEvent::Installed(outcome) => {
                if let Err(ref e) = outcome {
                    warn!(%run_id, "Install failed: {}", e);
                }
                let needs_restart = matches!(&outcome, Ok(result) if result.needs_restart());
                self.state.record_install(outcome);
                if needs_restart {
                    self.schedule_restart();
                }
            }
            StageEvent::Restart(outcome) => {
                debug!(%run_id, ?outcome, "Restart outcome");
                self.state.record_restart(outcome);
            }
        }
        self.publish();
    }

    fn schedule_restart(&mut self) {
        let delay = self.config.restart_delay;
        let events = self.events_tx.clone();
        let handle = self.restart.schedule_deferred_restart(delay, move |outcome| {
            let _ = events.send(StageEvent::Restart(outcome));
        });

        let deadline = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.state.schedule_restart(deadline);

        if let Some(previous) = self.pending_restart.replace(handle) {
            previous.cancel();
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.pending_restart.take() {
            if !handle.is_finished() {
                info!("Cancelling pending restart on shutdown");
            }
            handle.cancel();
        }
        info!(run_id = %self.state.run_id(), "Update orchestrator stopped");
    }
}

/// Cloneable handle to a running [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    run_id: Uuid,
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<PipelineState>,
}

impl OrchestratorHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Re-run the version check.
    pub async fn recheck(&self) -> Result<()> {
        self.act(Action::Recheck).await
    }

    /// Download the update announced by the latest check.
    pub async fn download(&self) -> Result<()> {
        self.act(Action::Download).await
    }

    /// Install the artifact from the latest successful download.
    pub async fn install(&self) -> Result<()> {
        self.act(Action::Install).await
    }

    /// Request the application restart without waiting for the timer.
    pub async fn restart_now(&self) -> Result<()> {
        self.act(Action::RestartNow).await
    }

    /// Dispatch `action`.
    ///
    /// Returns once the orchestrator has accepted the action and marked its
    /// stage in flight, or with the precondition that rejected it. Stage
    /// outcomes are observed through [`snapshot`](Self::snapshot) or
    /// [`subscribe`](Self::subscribe).
    pub async fn act(&self, action: Action) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Act { action, reply })
            .await
            .map_err(|_| Error::OrchestratorClosed)?;
        rx.await.map_err(|_| Error::OrchestratorClosed)??;
        Ok(())
    }

    /// Latest published state
    pub fn snapshot(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    /// Wait until a published state satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<PipelineState>
    where
        F: FnMut(&PipelineState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::OrchestratorClosed)?;
        Ok((*state).clone())
    }

    /// Wait until no stage is in flight.
    pub async fn settled(&self) -> Result<PipelineState> {
        self.wait_for(|s| s.active_stage() == ActiveStage::None).await
    }

    /// Tear the orchestrator down, cancelling a pending deferred restart.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Shutdown { reply })
            .await
            .map_err(|_| Error::OrchestratorClosed)?;
        rx.await.map_err(|_| Error::OrchestratorClosed)
    }
}
