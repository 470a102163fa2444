//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// Windows admin tool
///
/// Keeps the application up to date through its privileged backend.
#[derive(Parser, Debug)]
#[command(name = "wadm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use a simulated update backend instead of the bridge
    #[arg(long, global = true)]
    pub simulate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check for, download and install application updates
    Update(UpdateCommand),

    /// Run diagnostics
    Doctor,

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct UpdateCommand {
    #[command(subcommand)]
    pub action: Option<UpdateAction>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Interactive update panel (default)
    Panel,

    /// Check once for a newer version
    Check {
        /// Print the check result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check, download and install without prompting
    Apply,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_defaults_to_panel() {
        let cli = Cli::parse_from(["wadm", "update"]);
        match cli.command {
            Commands::Update(cmd) => assert!(cmd.action.is_none()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_simulate_is_global() {
        let cli = Cli::parse_from(["wadm", "update", "check", "--json", "--simulate"]);
        assert!(cli.simulate);
        match cli.command {
            Commands::Update(cmd) => {
                assert_eq!(cmd.action, Some(UpdateAction::Check { json: true }))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
