//! Database migrate, pull and transfer workflows
//!
//! Each workflow chains several external commands for one environment.
//! A failing step ends that environment's run; whether the remaining
//! environments still run is decided by the [`FailurePolicy`].

use crate::backup::{parse_backup_id, BackupInfo, BackupManager};
use crate::config::{DatabaseSettings, FailurePolicy};
use crate::environment::{ActiveSelection, EnvironmentBinding, EnvironmentRegistry};
use crate::error::{DeployError, EnvironmentFailure, Result};
use crate::executor::{CommandLine, CommandRunner};
use crate::platform::Platform;
use std::path::Path;
use tracing::{error, info, warn};
use url::Url;

/// Result of copying production data into another environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Environment that was restored
    pub target: String,
    /// Application the data came from
    pub source_app: String,
}

/// Runs database workflows against the platform and the local database
pub struct DatabaseWorkflow<'a> {
    registry: &'a EnvironmentRegistry,
    runner: &'a dyn CommandRunner,
    platform: Platform,
    backups: BackupManager,
    settings: &'a DatabaseSettings,
    production: String,
    failure_policy: FailurePolicy,
}

impl<'a> DatabaseWorkflow<'a> {
    /// Workflow storing pulled dumps with `backups`
    pub fn new(
        registry: &'a EnvironmentRegistry,
        runner: &'a dyn CommandRunner,
        settings: &'a DatabaseSettings,
        backups: BackupManager,
    ) -> Self {
        Self {
            registry,
            runner,
            platform: Platform::default(),
            backups,
            settings,
            production: "production".to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }

    /// Use a specific platform CLI
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Name of the canonical production environment
    #[must_use]
    pub fn with_production(mut self, production: impl Into<String>) -> Self {
        self.production = production.into();
        self
    }

    /// Behaviour when one environment fails
    #[must_use]
    pub const fn with_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Run migrations on the platform, then restart
    pub fn migrate(&self, environment: &EnvironmentBinding) -> Result<()> {
        info!(environment = %environment.name, "Migrating database");
        self.step(
            environment,
            "migrate",
            &self.platform.run(&environment.app, &self.settings.migrate),
        )?;
        self.step(
            environment,
            "restart",
            &self.platform.restart(&environment.app),
        )
    }

    /// Migrate every selected environment
    pub fn migrate_selection(&self, selection: &ActiveSelection) -> Result<()> {
        self.for_each(selection, |environment| self.migrate(environment))
            .map(drop)
    }

    /// Capture a fresh backup and restore it into the local database
    pub fn pull(&self, environment: &EnvironmentBinding) -> Result<BackupInfo> {
        let app = &environment.app;
        info!(environment = %environment.name, app = %app, "Pulling database");

        self.step(
            environment,
            "capture",
            &self.platform.backup_capture(app),
        )?;

        let listing = self
            .runner
            .run_capturing(&self.platform.backup_list(app))
            .map_err(|e| e.in_step(&environment.name, "list backups"))?;
        let backup_id = parse_backup_id(&listing)
            .ok_or_else(|| {
                DeployError::MissingBackupIdentifier { app: app.clone() }
                    .in_step(&environment.name, "list backups")
            })?
            .to_string();
        info!(environment = %environment.name, backup = %backup_id, "Captured backup");

        let file = self
            .backups
            .prepare(&environment.name, &backup_id)
            .map_err(|e| {
                DeployError::from(e).in_step(&environment.name, "prepare backup directory")
            })?;

        let url = self
            .runner
            .run_capturing(&self.platform.backup_url(app, Some(&backup_id)))
            .map_err(|e| e.in_step(&environment.name, "backup url"))?;
        let url = validate_backup_url(url.trim())
            .map_err(|e| e.in_step(&environment.name, "backup url"))?;

        self.step(environment, "download", &download(&url, &file))?;

        let database = self.settings.local_database(&environment.name, app);
        for reset in self.reset_commands(&database) {
            self.step(environment, "reset local database", &reset)?;
        }
        self.step(
            environment,
            "restore",
            &self.restore_local(&database, &file),
        )?;

        self.backups
            .inspect(&environment.name, &file)
            .map_err(|e| {
                DeployError::from(e).in_step(&environment.name, "inspect backup")
            })
    }

    /// Pull every selected environment
    pub fn pull_selection(&self, selection: &ActiveSelection) -> Result<Vec<BackupInfo>> {
        self.for_each(selection, |environment| self.pull(environment))
    }

    /// Restore a fresh production backup into every other selected environment
    ///
    /// Production itself is always skipped.
    pub fn transfer(&self, selection: &ActiveSelection) -> Result<Vec<TransferOutcome>> {
        let production = self.registry.get(&self.production)?;
        let outcomes = self.for_each(selection, |target| {
            if is_same_application(target, production) {
                info!(environment = %target.name, "Skipping production");
                return Ok(None);
            }
            self.transfer_into(production, target).map(Some)
        })?;
        Ok(outcomes.into_iter().flatten().collect())
    }

    fn transfer_into(
        &self,
        production: &EnvironmentBinding,
        target: &EnvironmentBinding,
    ) -> Result<TransferOutcome> {
        info!(from = %production.app, to = %target.app, "Transferring database");

        self.step(
            target,
            "capture",
            &self.platform.backup_capture(&production.app),
        )?;
        let url = self
            .runner
            .run_capturing(&self.platform.backup_url(&production.app, None))
            .map_err(|e| e.in_step(&target.name, "backup url"))?;
        let url =
            validate_backup_url(url.trim()).map_err(|e| e.in_step(&target.name, "backup url"))?;
        self.step(
            target,
            "restore",
            &self.platform.backup_restore(&target.app, url.as_str()),
        )?;

        Ok(TransferOutcome {
            target: target.name.clone(),
            source_app: production.app.clone(),
        })
    }

    fn step(
        &self,
        environment: &EnvironmentBinding,
        step: &'static str,
        command: &CommandLine,
    ) -> Result<()> {
        self.runner
            .run(command)
            .map_err(|e| e.in_step(&environment.name, step))
    }

    fn reset_commands(&self, database: &str) -> Vec<CommandLine> {
        CommandLine::from_argv(&self.settings.reset).map_or_else(
            || {
                vec![
                    CommandLine::new("dropdb").args(["--if-exists", database]),
                    CommandLine::new("createdb").arg(database),
                ]
            },
            |reset| vec![reset],
        )
    }

    fn restore_local(&self, database: &str, file: &Path) -> CommandLine {
        CommandLine::new("pg_restore")
            .args(["--verbose", "--clean", "--no-acl", "--no-owner"])
            .args(["-h", self.settings.host.as_str(), "-d", database])
            .arg(file.display().to_string())
    }

    fn for_each<T, F>(&self, selection: &ActiveSelection, mut work: F) -> Result<Vec<T>>
    where
        F: FnMut(&EnvironmentBinding) -> Result<T>,
    {
        let mut done = Vec::new();
        let mut failures = Vec::new();

        for environment in selection.require(self.registry)? {
            match work(environment) {
                Ok(value) => done.push(value),
                Err(err) if self.failure_policy == FailurePolicy::Continue => {
                    warn!(
                        environment = %environment.name,
                        error = %err,
                        "Database workflow failed, continuing"
                    );
                    failures.push(EnvironmentFailure {
                        environment: environment.name.clone(),
                        error: err,
                    });
                }
                Err(err) => {
                    error!(
                        environment = %environment.name,
                        error = %err,
                        "Database workflow failed"
                    );
                    return Err(err);
                }
            }
        }

        if failures.is_empty() {
            Ok(done)
        } else {
            Err(DeployError::BatchFailed { failures })
        }
    }
}

fn is_same_application(a: &EnvironmentBinding, b: &EnvironmentBinding) -> bool {
    a.name == b.name || a.app == b.app
}

fn validate_backup_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(DeployError::InvalidBackupUrl {
            url: raw.to_string(),
        }),
    }
}

fn download(url: &Url, file: &Path) -> CommandLine {
    CommandLine::new("curl")
        .args(["--fail", "--silent", "--show-error", "--location", "--output"])
        .arg(file.display().to_string())
        .arg(url.as_str())
}
