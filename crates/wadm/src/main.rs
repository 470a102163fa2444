//! wadm - Windows admin tool CLI
//!
//! Application self-update through the privileged backend process.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;
mod panel;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("wadm=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Update(cmd) => {
            let service = commands::update_service(&config, cli.simulate)?;
            commands::update::execute(cmd, service, &config).await
        }
        Commands::Doctor => commands::doctor::execute(&config, cli.simulate).await,
        Commands::Version => {
            println!("wadm {}", commands::CURRENT_VERSION);
            Ok(())
        }
    }
}
