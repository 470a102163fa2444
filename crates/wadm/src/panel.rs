//! Terminal rendering of the update panel.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use colored::Colorize;
use wadm_core::view::{PanelStep, PanelView, RestartBanner, StageView, UpdateDetails};

const STEPS: [PanelStep; 3] = [PanelStep::Check, PanelStep::Download, PanelStep::Install];

/// Render `view` as it stands at `now`.
pub fn render(view: &PanelView, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "Application Update".cyan().bold());
    let _ = writeln!(out, "{}", "─".repeat(50));
    let _ = writeln!(out, "  {}", stepper(view.step));
    if let Some(ref version) = view.current_version {
        let _ = writeln!(out, "  Installed version: {}", version);
    }
    let _ = writeln!(out);

    for (label, stage) in [
        ("Check", &view.check),
        ("Download", &view.download),
        ("Install", &view.install),
    ] {
        let _ = writeln!(out, "  {:<10}{}", label, stage_line(stage));
    }

    if let Some(ref update) = view.update {
        let _ = writeln!(out);
        render_update(&mut out, update);
    }

    if let Some(ref banner) = view.restart {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", restart_line(banner, now));
    }

    out
}

fn stepper(current: PanelStep) -> String {
    STEPS
        .iter()
        .map(|step| {
            if *step == current {
                format!("● {}", step.label()).cyan().bold().to_string()
            } else if *step < current {
                format!("✓ {}", step.label()).green().to_string()
            } else {
                format!("○ {}", step.label()).dimmed().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("  ─  ")
}

fn stage_line(stage: &StageView) -> String {
    match stage {
        StageView::NotRun => "○ not run".dimmed().to_string(),
        StageView::InFlight => "… in progress".yellow().to_string(),
        StageView::Failed(error) => format!("✗ {}", error).red().to_string(),
        StageView::Unsuccessful(message) => format!("✗ {}", message).red().to_string(),
        StageView::Succeeded(summary) => format!("✓ {}", summary).green().to_string(),
    }
}

fn render_update(out: &mut String, update: &UpdateDetails) {
    let mut heading = format!(
        "Version {} (released {}, {:.1} MB)",
        update.version,
        update.release_date.format("%Y-%m-%d"),
        update.size_mb
    )
    .bold()
    .to_string();
    if update.is_critical {
        heading = format!("{} {}", heading, "[critical]".red().bold());
    }

    let _ = writeln!(out, "  {}", heading);
    if !update.description.is_empty() {
        let _ = writeln!(out, "  {}", update.description);
    }
    for change in &update.changes {
        let _ = writeln!(out, "    • {}", change);
    }
}

fn restart_line(banner: &RestartBanner, now: DateTime<Utc>) -> String {
    match banner {
        RestartBanner::Pending { deadline } => {
            let secs = (*deadline - now).num_seconds().max(0);
            format!("⟳ The application will restart in {}s", secs)
                .yellow()
                .bold()
                .to_string()
        }
        RestartBanner::Requested { trigger } => {
            format!("⟳ Restart requested ({})", trigger).green().to_string()
        }
        RestartBanner::Failed(error) => format!("✗ Restart failed: {}", error).red().to_string(),
    }
}
