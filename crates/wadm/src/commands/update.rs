//! Update commands: interactive panel, one-shot check and unattended apply.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use colored::Colorize;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::debug;
use wadm_core::UpdateService;
use wadm_core::orchestrator::{
    Action, ActiveStage, Orchestrator, OrchestratorHandle, PipelineState, RestartStatus,
};
use wadm_core::view::{PanelView, RestartBanner};

use crate::cli::{UpdateAction, UpdateCommand};
use crate::config::Config;
use crate::panel;

pub async fn execute(
    cmd: UpdateCommand,
    service: Arc<dyn UpdateService>,
    config: &Config,
) -> Result<()> {
    match cmd.action.unwrap_or(UpdateAction::Panel) {
        UpdateAction::Panel => run_panel(service, config).await,
        UpdateAction::Check { json } => check(service, config, json).await,
        UpdateAction::Apply => apply(service, config).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interactive Panel
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Act(Action),
    Close,
}

impl Choice {
    fn label(&self) -> &'static str {
        match self {
            Choice::Act(action) => action.label(),
            Choice::Close => "Close",
        }
    }
}

async fn run_panel(service: Arc<dyn UpdateService>, config: &Config) -> Result<()> {
    let policy = config.updater.install_retry;
    let handle = Orchestrator::spawn(service, config.orchestrator_config());

    loop {
        let state = settle(&handle).await?;
        let view = PanelView::from_state(&state, policy);
        println!();
        print!("{}", panel::render(&view, Utc::now()));

        // The backend takes the process down from here
        if matches!(state.restart(), RestartStatus::Requested { .. }) {
            handle.shutdown().await?;
            return Ok(());
        }

        let choices = panel_choices(&view);

        let picked = tokio::select! {
            picked = prompt(&choices) => picked?,
            true = restart_requested(handle.subscribe()) => {
                println!();
                println!("{}", "⟳ Restarting application...".green());
                let _ = handle.shutdown().await;
                // The blocking prompt still owns the terminal.
                std::process::exit(0);
            }
        };

        // Esc only closes when Close is on offer
        let dismissed = choices.contains(&Choice::Close).then_some(Choice::Close);
        let Some(picked) = picked.or(dismissed) else {
            continue;
        };

        match picked {
            Choice::Close => {
                handle.shutdown().await?;
                return Ok(());
            }
            Choice::Act(Action::RestartNow) => {
                let mut rx = handle.subscribe();
                rx.borrow_and_update();
                handle.restart_now().await?;

                let pb = spinner("Requesting restart...");
                let changed = rx.changed().await;
                pb.finish_and_clear();
                changed.context("Update orchestrator stopped")?;
            }
            Choice::Act(action) => {
                debug!(?action, "Panel action");
                handle.act(action).await?;
            }
        }
    }
}

/// Enabled actions, then Close unless a restart is pending.
fn panel_choices(view: &PanelView) -> Vec<Choice> {
    let mut choices: Vec<Choice> = view.actions.iter().map(Choice::Act).collect();
    if !matches!(view.restart, Some(RestartBanner::Pending { .. })) {
        choices.push(Choice::Close);
    }
    choices
}

/// Ask for one of `choices`; `None` when dismissed with Esc.
async fn prompt(choices: &[Choice]) -> Result<Option<Choice>> {
    let labels: Vec<&'static str> = choices.iter().map(Choice::label).collect();

    let picked = tokio::task::spawn_blocking(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Choose an action")
            .items(&labels)
            .default(0)
            .interact_opt()
    })
    .await
    .context("Prompt task failed")?
    .context("Failed to read selection")?;

    Ok(picked.and_then(|i| choices.get(i).copied()))
}

async fn restart_requested(mut rx: watch::Receiver<PipelineState>) -> bool {
    rx.wait_for(|s| matches!(s.restart(), RestartStatus::Requested { .. }))
        .await
        .is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn check(service: Arc<dyn UpdateService>, config: &Config, json: bool) -> Result<()> {
    let handle = Orchestrator::spawn(service, config.orchestrator_config());
    let state = if json {
        handle.settled().await?
    } else {
        settle(&handle).await?
    };
    handle.shutdown().await?;

    if let Some(error) = state.check().error() {
        bail!("Update check failed: {}", error);
    }
    let result = state
        .check()
        .result()
        .context("Update check produced no result")?;

    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let view = PanelView::from_state(&state, config.updater.install_retry);
        print!("{}", panel::render(&view, Utc::now()));
    }
    Ok(())
}

async fn apply(service: Arc<dyn UpdateService>, config: &Config) -> Result<()> {
    let handle = Orchestrator::spawn(service, config.orchestrator_config());
    let outcome = apply_pipeline(&handle).await;
    // Already stopped if the pipeline hit a closed orchestrator
    let _ = handle.shutdown().await;
    outcome
}

async fn apply_pipeline(handle: &OrchestratorHandle) -> Result<()> {
    let state = settle(handle).await?;
    if let Some(error) = state.check().error() {
        bail!("Update check failed: {}", error);
    }
    let Some(result) = state.check().result().filter(|r| r.update_available) else {
        let current = state
            .check()
            .result()
            .map(|r| r.current_version.as_str())
            .unwrap_or("unknown");
        println!("{}", format!("✓ Already up to date ({})", current).green());
        return Ok(());
    };
    println!(
        "Version {} is available (installed: {})",
        result.latest_version.bold(),
        result.current_version
    );

    handle.download().await?;
    let state = settle(handle).await?;
    if let Some(error) = state.download().error() {
        bail!("Download failed: {}", error);
    }
    let Some(path) = state.artifact_path() else {
        let message = state
            .download()
            .result()
            .map(|r| r.message.as_str())
            .unwrap_or_default();
        bail!("Download did not complete: {}", message);
    };
    println!("{}", format!("✓ Downloaded to {}", path).green());

    handle.install().await?;
    let state = settle(handle).await?;
    if let Some(error) = state.install().error() {
        bail!("Install failed: {}", error);
    }
    if !state.install_succeeded() {
        let message = state
            .install()
            .result()
            .map(|r| r.message.as_str())
            .unwrap_or_default();
        bail!("Install did not complete: {}", message);
    }
    println!("{}", "✓ Update installed".green());

    if !state.restart_required() {
        return Ok(());
    }
    if let RestartStatus::Pending { deadline } = state.restart() {
        let secs = (*deadline - Utc::now()).num_seconds().max(0);
        println!("{}", format!("⟳ Restarting in {}s", secs).yellow());
    }

    let state = handle
        .wait_for(|s| {
            matches!(
                s.restart(),
                RestartStatus::Requested { .. } | RestartStatus::Failed { .. }
            )
        })
        .await?;
    match state.restart() {
        RestartStatus::Failed { error } => bail!("Restart failed: {}", error),
        RestartStatus::Requested { trigger, .. } => {
            println!("{}", format!("⟳ Restart requested ({})", trigger).green());
        }
        _ => {}
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress
// ─────────────────────────────────────────────────────────────────────────────

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn busy_message(state: &PipelineState) -> &'static str {
    match state.active_stage() {
        ActiveStage::Checking => "Checking for updates...",
        ActiveStage::Downloading => "Downloading update...",
        ActiveStage::Installing => "Installing update...",
        ActiveStage::None => "Working...",
    }
}

/// Wait for the in-flight stage, with a spinner while it runs.
async fn settle(handle: &OrchestratorHandle) -> Result<PipelineState> {
    let current = handle.snapshot();
    if current.active_stage() == ActiveStage::None {
        return Ok(current);
    }

    let pb = spinner(busy_message(&current));
    let state = handle.settled().await;
    pb.finish_and_clear();
    Ok(state?)
}
