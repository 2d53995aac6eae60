//! Platform CLI invocations
//!
//! Each method returns the command line for one platform subcommand.
//! Nothing here runs anything.

use crate::environment::EnvironmentBinding;
use crate::executor::CommandLine;
use std::collections::BTreeMap;

/// Command line builder for the platform CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    program: String,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("heroku")
    }
}

impl Platform {
    /// Use `program` as the platform CLI
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.program)
    }

    fn for_app(&self, args: &[&str], app: &str) -> CommandLine {
        self.command()
            .args(args.iter().copied())
            .args(["--app", app])
    }

    /// Application info
    #[must_use]
    pub fn info(&self, app: &str) -> CommandLine {
        self.for_app(&["info"], app)
    }

    /// Config vars
    #[must_use]
    pub fn config(&self, app: &str) -> CommandLine {
        self.for_app(&["config", "--long"], app)
    }

    /// Follow the application log
    #[must_use]
    pub fn logs(&self, app: &str) -> CommandLine {
        self.for_app(&["logs", "--tail"], app)
    }

    /// Restart every dyno
    #[must_use]
    pub fn restart(&self, app: &str) -> CommandLine {
        self.for_app(&["restart"], app)
    }

    /// Remote console; legacy stacks have a dedicated subcommand
    #[must_use]
    pub fn console(&self, binding: &EnvironmentBinding) -> CommandLine {
        if is_legacy_stack(&binding.stack) {
            self.for_app(&["console"], &binding.app)
        } else {
            self.for_app(&["run", "console"], &binding.app)
        }
    }

    /// Capture a code and asset bundle
    #[must_use]
    pub fn capture_bundle(&self, app: &str) -> CommandLine {
        self.for_app(&["bundles:capture"], app)
    }

    /// Run a one-off command on the platform
    #[must_use]
    pub fn run(&self, app: &str, argv: &[String]) -> CommandLine {
        self.command()
            .arg("run")
            .args(argv.iter().cloned())
            .args(["--app", app])
    }

    /// Capture a database backup
    #[must_use]
    pub fn backup_capture(&self, app: &str) -> CommandLine {
        self.for_app(&["pg:backups:capture"], app)
    }

    /// List database backups
    ///
    /// `db pull` reads the captured id from the last line of this output,
    /// so the CLI must print backups oldest first with nothing after them.
    /// Any other layout ends the pull with `MissingBackupIdentifier`.
    #[must_use]
    pub fn backup_list(&self, app: &str) -> CommandLine {
        self.for_app(&["pg:backups"], app)
    }

    /// Signed download URL of a backup; the latest when `backup_id` is `None`
    #[must_use]
    pub fn backup_url(&self, app: &str, backup_id: Option<&str>) -> CommandLine {
        let mut args = vec!["pg:backups:url"];
        args.extend(backup_id);
        self.for_app(&args, app)
    }

    /// Restore `app`'s database from a backup URL
    #[must_use]
    pub fn backup_restore(&self, app: &str, url: &str) -> CommandLine {
        self.for_app(&["pg:backups:restore", url, "DATABASE_URL"], app)
            .args(["--confirm", app])
    }

    /// List the applications the current user can access
    #[must_use]
    pub fn list_apps(&self) -> CommandLine {
        self.command().arg("apps")
    }

    /// Create an application
    #[must_use]
    pub fn create_app(&self, app: &str, stack: &str) -> CommandLine {
        self.command().args(["create", app, "--stack", stack])
    }

    /// Move an application to another stack
    #[must_use]
    pub fn set_stack(&self, app: &str, stack: &str) -> CommandLine {
        self.for_app(&["stack:set", stack], app)
    }

    /// Grant a collaborator access
    #[must_use]
    pub fn add_collaborator(&self, app: &str, email: &str) -> CommandLine {
        self.for_app(&["access:add", email], app)
    }

    /// Set config vars in one release
    #[must_use]
    pub fn set_config(&self, app: &str, vars: &BTreeMap<String, String>) -> CommandLine {
        self.command()
            .arg("config:set")
            .args(vars.iter().map(|(key, value)| format!("{key}={value}")))
            .args(["--app", app])
    }

    /// Provision an add-on
    #[must_use]
    pub fn add_addon(&self, app: &str, addon: &str) -> CommandLine {
        self.for_app(&["addons:create", addon], app)
    }

    /// Attach a custom domain
    #[must_use]
    pub fn add_domain(&self, app: &str, domain: &str) -> CommandLine {
        self.for_app(&["domains:add", domain], app)
    }
}

/// Stacks predating `run`, which open a console with `console`
#[must_use]
pub fn is_legacy_stack(stack: &str) -> bool {
    stack.starts_with("aspen") || stack.starts_with("bamboo")
}

/// Application names from the `apps` listing
///
/// Header lines start with `===`; the name is the first token of every
/// other non-blank line.
#[must_use]
pub fn parse_app_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("==="))
        .filter_map(|line| line.split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}
