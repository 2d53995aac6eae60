use crate::config::CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI interface for `multideploy`
#[derive(Parser)]
#[command(name = "multideploy")]
#[command(version = crate::VERSION)]
#[command(about = "multideploy - Deploy one codebase to many platform environments")]
#[command(
    long_about = "Select environments with --env (repeatable) or --all, then run a command against them.\n\
                  Environments are processed one at a time, in the order they are declared."
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Select an environment; repeat for several, `all` selects every one
    #[arg(short, long = "env", global = true, value_name = "NAME")]
    pub environments: Vec<String>,

    /// Select every environment
    #[arg(long, global = true)]
    pub all: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List configured apps
    Apps {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a git remote for every app
    Remotes,
    /// Show remote app information
    Info,
    /// Deploy the current branch
    Deploy {
        /// Keep deploying the remaining environments after a failed push
        #[arg(long)]
        keep_going: bool,
    },
    /// Deploy the current branch, overwriting remote history
    ForceDeploy {
        /// Keep deploying the remaining environments after a failed push
        #[arg(long)]
        keep_going: bool,
    },
    /// Capture a bundle on the platform
    Capture,
    /// Open a remote console
    Console,
    /// Tail the platform logs
    Logs,
    /// Restart the apps
    Restart,
    /// Show the platform config vars
    Config,
    /// Provision apps from configuration; without a step, run them all
    Setup {
        /// Single step to run
        #[command(subcommand)]
        step: Option<SetupCommands>,
    },
    /// Database operations
    Db {
        /// Database command
        #[command(subcommand)]
        command: DbCommands,
    },
}

/// Setup steps
#[derive(Subcommand, Clone, Copy)]
pub enum SetupCommands {
    /// Create the apps
    Apps,
    /// Set the stacks
    Stacks,
    /// Add collaborators
    Collaborators,
    /// Set config vars
    Config,
    /// Provision add-ons
    Addons,
    /// Attach domains
    Domains,
}

/// Database commands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Migrate and restart
    Migrate {
        /// Continue with the remaining environments after a failure
        #[arg(long)]
        keep_going: bool,
    },
    /// Capture a backup and restore it into the local database
    Pull {
        /// Continue with the remaining environments after a failure
        #[arg(long)]
        keep_going: bool,
    },
    /// Copy production data into the selected environments
    Transfer {
        /// Continue with the remaining environments after a failure
        #[arg(long)]
        keep_going: bool,
    },
    /// List locally pulled backups
    Backups,
}

impl Cli {
    /// Parse command line arguments
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
