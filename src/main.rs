use multideploy::cli::{Cli, Commands, DbCommands, SetupCommands};
use multideploy::commands::inspect::{handle_inspection, Inspection};
use multideploy::commands::setup::SetupStep;
use multideploy::commands::{apps, db, deploy, setup};
use multideploy::session::Session;
use std::process;
use tracing_subscriber::EnvFilter;

// Allow println in main CLI binary
#[allow(clippy::disallowed_methods)]
fn main() {
    init_logging();

    let cli = Cli::parse();
    tracing::debug!("multideploy CLI initialized");

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut session = Session::load(&cli.config)?;
    session.select(&cli.environments, cli.all)?;

    match cli.command {
        Commands::Apps { json } => apps::handle_apps(&mut session, json),
        Commands::Remotes => apps::handle_remotes(&mut session),
        Commands::Info => handle_inspection(&session, Inspection::Info),
        Commands::Deploy { keep_going } => deploy::handle_deploy(&session, false, keep_going),
        Commands::ForceDeploy { keep_going } => deploy::handle_deploy(&session, true, keep_going),
        Commands::Capture => handle_inspection(&session, Inspection::Capture),
        Commands::Console => handle_inspection(&session, Inspection::Console),
        Commands::Logs => handle_inspection(&session, Inspection::Logs),
        Commands::Restart => handle_inspection(&session, Inspection::Restart),
        Commands::Config => handle_inspection(&session, Inspection::Config),
        Commands::Setup { step } => setup::handle_setup(&session, step.map(setup_step)),
        Commands::Db { command } => match command {
            DbCommands::Migrate { keep_going } => db::handle_migrate(&session, keep_going),
            DbCommands::Pull { keep_going } => db::handle_pull(&session, keep_going),
            DbCommands::Transfer { keep_going } => db::handle_transfer(&session, keep_going),
            DbCommands::Backups => db::handle_backups(&session),
        },
    }
}

const fn setup_step(command: SetupCommands) -> SetupStep {
    match command {
        SetupCommands::Apps => SetupStep::Apps,
        SetupCommands::Stacks => SetupStep::Stacks,
        SetupCommands::Collaborators => SetupStep::Collaborators,
        SetupCommands::Config => SetupStep::Config,
        SetupCommands::Addons => SetupStep::Addons,
        SetupCommands::Domains => SetupStep::Domains,
    }
}

/// Initialize logging based on environment variables
fn init_logging() {
    // Default to INFO level, can be overridden by RUST_LOG environment variable
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("multideploy=info,warn"));

    // Logs go to stderr; stdout carries the echoed commands
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
