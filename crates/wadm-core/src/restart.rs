//! Restart coordination after a successful install.
//!
//! A restart request is issued at most once per coordinator: whichever of the
//! deferred timer or a manual "restart now" gets there first issues it, and
//! the other becomes a no-op. A failed request re-arms the coordinator so the
//! user can try again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::bridge::UpdateService;
use crate::error::UpdateServiceError;

/// What caused a restart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartTrigger {
    /// The observation delay after install elapsed
    Deferred,
    /// The user pressed "restart now"
    Manual,
}

impl fmt::Display for RestartTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestartTrigger::Deferred => "deferred",
            RestartTrigger::Manual => "manual",
        })
    }
}

/// Result of one attempt to issue the restart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The backend accepted the request
    Issued { trigger: RestartTrigger },
    /// An earlier attempt already issued it; nothing was sent
    AlreadyIssued,
    /// The backend could not initiate the restart
    Failed(UpdateServiceError),
}

/// Issues the application restart, immediately or after a delay.
#[derive(Clone)]
pub struct RestartCoordinator {
    service: Arc<dyn UpdateService>,
    issued: Arc<AtomicBool>,
}

impl RestartCoordinator {
    pub fn new(service: Arc<dyn UpdateService>) -> Self {
        Self {
            service,
            issued: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a restart request has been accepted by the backend or is being sent.
    pub fn is_issued(&self) -> bool {
        self.issued.load(Ordering::SeqCst)
    }

    /// Issue the restart request once `delay` has elapsed.
    ///
    /// `on_fired` receives the outcome when the timer fires. The returned
    /// handle is the only way to stop the timer.
    pub fn schedule_deferred_restart<F>(&self, delay: Duration, on_fired: F) -> RestartHandle
    where
        F: FnOnce(RestartOutcome) + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let coordinator = self.clone();
        info!("Application restart scheduled in {:?}", delay);

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let outcome = coordinator.issue(RestartTrigger::Deferred).await;
            on_fired(outcome);
        });

        RestartHandle { task, deadline }
    }

    /// Issue the restart request now, bypassing any pending timer.
    pub async fn restart_now(&self) -> RestartOutcome {
        self.issue(RestartTrigger::Manual).await
    }

    async fn issue(&self, trigger: RestartTrigger) -> RestartOutcome {
        if self.issued.swap(true, Ordering::SeqCst) {
            debug!("Restart already requested, ignoring {} trigger", trigger);
            return RestartOutcome::AlreadyIssued;
        }

        info!(%trigger, "Requesting application restart");
        match self.service.restart_application().await {
            Ok(()) => RestartOutcome::Issued { trigger },
            Err(e) => {
                error!("Restart request failed: {}", e);
                self.issued.store(false, Ordering::SeqCst);
                RestartOutcome::Failed(e)
            }
        }
    }
}

/// A scheduled deferred restart.
#[derive(Debug)]
pub struct RestartHandle {
    task: JoinHandle<()>,
    deadline: Instant,
}

impl RestartHandle {
    /// Time left before the timer fires
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the timer has fired and its request has completed
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer. Only used when the owning orchestrator shuts down.
    pub fn cancel(self) {
        self.task.abort();
    }
}
