//! One platform call per selected environment

use crate::environment::EnvironmentBinding;
use crate::executor::CommandLine;
use crate::platform::Platform;
use crate::session::Session;
use anyhow::{Context, Result};
use tracing::info;

/// Platform operations that need nothing but the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    /// Application info
    Info,
    /// Config vars
    Config,
    /// Tail the log
    Logs,
    /// Restart
    Restart,
    /// Remote console
    Console,
    /// Capture a bundle
    Capture,
}

impl Inspection {
    fn command(self, platform: &Platform, binding: &EnvironmentBinding) -> CommandLine {
        match self {
            Self::Info => platform.info(&binding.app),
            Self::Config => platform.config(&binding.app),
            Self::Logs => platform.logs(&binding.app),
            Self::Restart => platform.restart(&binding.app),
            Self::Console => platform.console(binding),
            Self::Capture => platform.capture_bundle(&binding.app),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Config => "config",
            Self::Logs => "logs",
            Self::Restart => "restart",
            Self::Console => "console",
            Self::Capture => "capture",
        }
    }
}

/// Run an inspection against every selected environment, in order
#[allow(clippy::disallowed_methods)]
pub fn handle_inspection(session: &Session, inspection: Inspection) -> Result<()> {
    let platform = session.platform();

    for binding in session.targets()? {
        info!(
            environment = %binding.name,
            operation = inspection.name(),
            "Running platform command"
        );
        session
            .runner()
            .run(&inspection.command(&platform, binding))
            .with_context(|| format!("{} failed for {}", inspection.name(), binding.name))?;

        if inspection == Inspection::Info {
            println!();
        }
    }
    Ok(())
}
