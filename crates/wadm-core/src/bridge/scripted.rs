//! Scripted update service.
//!
//! Answers each operation from a queue of prepared responses and records
//! every call it receives, in order. Once an operation's queue is drained the
//! optional fallback response is repeated; without one the call fails.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::UpdateService;
use crate::error::{Operation, UpdateServiceError};
use crate::types::{DownloadResult, InstallResult, UpdateCheckResult, UpdateInfo};

const SIMULATED_ARTIFACT_URL: &str = "https://updates.wadm.invalid/releases/wadm-1.1.0.msi";

type Response<T> = Result<T, UpdateServiceError>;

/// A call received by [`ScriptedUpdateService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CheckForUpdates,
    DownloadUpdate { artifact_url: String },
    InstallUpdate { artifact_path: String },
    RestartApplication,
}

struct Responses<T> {
    queue: VecDeque<Response<T>>,
    fallback: Option<Response<T>>,
}

impl<T: Clone> Responses<T> {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: None,
        }
    }

    fn next(&mut self, operation: Operation) -> Response<T> {
        self.queue
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| {
                Err(UpdateServiceError::failed(
                    operation,
                    "no scripted response left",
                ))
            })
    }
}

struct Script {
    checks: Responses<UpdateCheckResult>,
    downloads: Responses<DownloadResult>,
    installs: Responses<InstallResult>,
    restarts: Responses<()>,
    calls: Vec<RecordedCall>,
}

/// In-process [`UpdateService`] driven by prepared responses.
pub struct ScriptedUpdateService {
    script: Mutex<Script>,
    latency: Duration,
}

impl Default for ScriptedUpdateService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedUpdateService {
    /// Create a service with empty scripts; restarts succeed by default.
    pub fn new() -> Self {
        let mut restarts = Responses::new();
        restarts.fallback = Some(Ok(()));

        Self {
            script: Mutex::new(Script {
                checks: Responses::new(),
                downloads: Responses::new(),
                installs: Responses::new(),
                restarts,
                calls: Vec::new(),
            }),
            latency: Duration::ZERO,
        }
    }

    /// A service that always offers version 1.1.0 over `current_version`,
    /// downloads it to the temp directory and installs it requiring a restart.
    pub fn simulated(current_version: &str) -> Self {
        let file_name = SIMULATED_ARTIFACT_URL
            .rsplit('/')
            .next()
            .unwrap_or("wadm-update.msi");
        let artifact_path = std::env::temp_dir().join(file_name);

        let info = UpdateInfo {
            version: "1.1.0".to_string(),
            artifact_url: SIMULATED_ARTIFACT_URL.to_string(),
            release_date: Utc::now(),
            description: "Simulated maintenance release".to_string(),
            is_critical: false,
            size_mb: 15.2,
            changes: vec![
                "Improved service management panel".to_string(),
                "Faster event log queries".to_string(),
                "Security fixes".to_string(),
            ],
        };

        let service = Self::new().with_latency(Duration::from_millis(800));
        {
            let mut script = service.lock();
            script.checks.fallback = Some(Ok(UpdateCheckResult::available(current_version, info)));
            script.downloads.fallback = Some(Ok(DownloadResult {
                success: true,
                artifact_path: artifact_path.display().to_string(),
                message: "Update downloaded".to_string(),
            }));
            script.installs.fallback = Some(Ok(InstallResult {
                success: true,
                message: "Update installed".to_string(),
                restart_required: true,
            }));
        }
        service
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_check(&self, response: Response<UpdateCheckResult>) -> &Self {
        self.lock().checks.queue.push_back(response);
        self
    }

    pub fn push_download(&self, response: Response<DownloadResult>) -> &Self {
        self.lock().downloads.queue.push_back(response);
        self
    }

    pub fn push_install(&self, response: Response<InstallResult>) -> &Self {
        self.lock().installs.queue.push_back(response);
        self
    }

    pub fn push_restart(&self, response: Response<()>) -> &Self {
        self.lock().restarts.queue.push_back(response);
        self
    }

    /// All calls received so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of restart requests received so far
    pub fn restart_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::RestartApplication))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn answer<T: Clone>(
        &self,
        call: RecordedCall,
        pick: impl FnOnce(&mut Script) -> Response<T>,
    ) -> Response<T> {
        let response = {
            let mut script = self.lock();
            script.calls.push(call);
            pick(&mut script)
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        response
    }
}

#[async_trait]
impl UpdateService for ScriptedUpdateService {
    async fn check_for_updates(&self) -> Response<UpdateCheckResult> {
        self.answer(RecordedCall::CheckForUpdates, |s| {
            s.checks.next(Operation::CheckForUpdates)
        })
        .await
    }

    async fn download_update(&self, artifact_url: &str) -> Response<DownloadResult> {
        let call = RecordedCall::DownloadUpdate {
            artifact_url: artifact_url.to_string(),
        };
        self.answer(call, |s| s.downloads.next(Operation::DownloadUpdate))
            .await
    }

    async fn install_update(&self, artifact_path: &str) -> Response<InstallResult> {
        let call = RecordedCall::InstallUpdate {
            artifact_path: artifact_path.to_string(),
        };
        self.answer(call, |s| s.installs.next(Operation::InstallUpdate))
            .await
    }

    async fn restart_application(&self) -> Response<()> {
        self.answer(RecordedCall::RestartApplication, |s| {
            s.restarts.next(Operation::RestartApplication)
        })
        .await
    }
}
