//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

pub async fn execute(config: &Config, simulate: bool) -> Result<()> {
    println!("{}", "wadm Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", format!("✓ {}", config_path.display()).green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check bridge credentials
    print!("  Bridge token: ");
    if config.has_token() {
        println!("{}", "✓ configured".green());
    } else {
        println!("{}", "○ none (unauthenticated)".yellow());
    }

    println!(
        "  Restart delay: {}s, install retry: {:?}",
        config.updater.restart_delay_secs, config.updater.install_retry
    );

    // Check bridge connectivity
    if simulate {
        println!("  Bridge: {}", "○ skipped (simulated backend)".yellow());
    } else {
        print!("  Bridge ({}):", config.bridge.url);
        match config.bridge_client() {
            Ok(client) => match client.health().await {
                Ok(()) => println!(" {}", "✓ reachable".green()),
                Err(e) => {
                    println!(" {}", format!("✗ {}", e).red());
                    issues.push("Cannot reach the backend bridge - is the service running?");
                }
            },
            Err(e) => {
                println!(" {}", format!("✗ {}", e).red());
                issues.push("Bridge client could not be created");
            }
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
