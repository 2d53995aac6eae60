//! Provisioning apps on the platform from configuration

use crate::platform::parse_app_names;
use crate::session::Session;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// One provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Create missing apps
    Apps,
    /// Set each app's stack
    Stacks,
    /// Grant collaborators access
    Collaborators,
    /// Set config vars
    Config,
    /// Provision add-ons
    Addons,
    /// Attach custom domains
    Domains,
}

impl SetupStep {
    /// Every step, in the order a full setup runs them
    pub const ALL: [Self; 6] = [
        Self::Apps,
        Self::Stacks,
        Self::Collaborators,
        Self::Config,
        Self::Addons,
        Self::Domains,
    ];
}

/// Handle setup; `None` runs every step
pub fn handle_setup(session: &Session, step: Option<SetupStep>) -> Result<()> {
    let steps = step.map_or_else(|| SetupStep::ALL.to_vec(), |step| vec![step]);
    for step in steps {
        info!(?step, "Running setup step");
        run_step(session, step).with_context(|| format!("setup {step:?} failed"))?;
    }
    Ok(())
}

fn run_step(session: &Session, step: SetupStep) -> Result<()> {
    let platform = session.platform();
    let runner = session.runner();
    let targets = session.targets()?;

    let existing = if step == SetupStep::Apps {
        parse_app_names(&runner.run_capturing(&platform.list_apps())?)
    } else {
        Vec::new()
    };

    for binding in targets {
        let Some(env) = session.config.environment(&binding.name) else {
            continue;
        };
        let settings = session.config.setup_for(env);
        let app = binding.app.as_str();

        match step {
            SetupStep::Apps => {
                if existing.iter().any(|name| name == app) {
                    debug!(app, "App already exists");
                } else {
                    runner.run(&platform.create_app(app, &binding.stack))?;
                }
            }
            SetupStep::Stacks => {
                runner.run(&platform.set_stack(app, &binding.stack))?;
            }
            SetupStep::Collaborators => {
                for email in &settings.collaborators {
                    runner.run(&platform.add_collaborator(app, email))?;
                }
            }
            SetupStep::Config => {
                if !settings.config.is_empty() {
                    runner.run(&platform.set_config(app, &settings.config))?;
                }
            }
            SetupStep::Addons => {
                for addon in &settings.addons {
                    runner.run(&platform.add_addon(app, addon))?;
                }
            }
            SetupStep::Domains => {
                for domain in &settings.domains {
                    runner.run(&platform.add_domain(app, domain))?;
                }
            }
        }
    }
    Ok(())
}
