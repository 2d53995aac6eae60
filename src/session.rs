//! Everything one CLI invocation works with
//!
//! A session owns the loaded configuration, the registry built from it,
//! the command runner, hooks and the environments selected so far.

use crate::backup::BackupManager;
use crate::config::{Config, FailurePolicy};
use crate::database::DatabaseWorkflow;
use crate::environment::{ActiveSelection, EnvironmentBinding, EnvironmentRegistry, ALL};
use crate::error::Result;
use crate::executor::{CommandRunner, SystemRunner};
use crate::git::{Git, GitWorkingCopy, SourceControl};
use crate::hooks::Hooks;
use crate::pipeline::{DeployOptions, DeployPipeline};
use crate::platform::Platform;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loaded configuration plus collaborators
pub struct Session {
    /// Parsed configuration
    pub config: Config,
    /// Project root; relative paths in the configuration start here
    pub root: PathBuf,
    registry: EnvironmentRegistry,
    runner: Box<dyn CommandRunner>,
    source: Box<dyn SourceControl>,
    hooks: Hooks,
    selection: ActiveSelection,
}

impl Session {
    /// Load `path` and wire real git and process runners
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let config = Config::from_file(path)?;
        let root = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let runner = Box::new(SystemRunner::in_dir(&root));
        let source = Box::new(GitWorkingCopy::new(Git::new(&config.platform.git), &root));
        Self::new(config, root, runner, source)
    }

    /// Assemble a session from parts
    pub fn new(
        config: Config,
        root: PathBuf,
        runner: Box<dyn CommandRunner>,
        source: Box<dyn SourceControl>,
    ) -> Result<Self> {
        let registry = EnvironmentRegistry::from_config(&config)?;
        let hooks = Hooks::from_commands(&config.hooks);
        info!(
            environments = registry.len(),
            root = %root.display(),
            "Session ready"
        );

        Ok(Self {
            config,
            root,
            registry,
            runner,
            source,
            hooks,
            selection: ActiveSelection::new(),
        })
    }

    /// Add programmatic hooks on top of the configured ones
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Declared environments
    #[must_use]
    pub const fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// Command runner in use
    #[must_use]
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Environments selected so far
    #[must_use]
    pub const fn selection(&self) -> &ActiveSelection {
        &self.selection
    }

    /// Apply `--env` names and `--all`; `all` as a name selects everything
    pub fn select(&mut self, names: &[String], all: bool) -> Result<()> {
        let mut selection = std::mem::take(&mut self.selection);
        let result = self.apply_selection(&mut selection, names, all);
        self.selection = selection;
        result
    }

    fn apply_selection(
        &self,
        selection: &mut ActiveSelection,
        names: &[String],
        all: bool,
    ) -> Result<()> {
        let pipeline = self.pipeline();
        if all {
            pipeline.select_all(selection);
        }
        for name in names {
            if name == ALL {
                pipeline.select_all(selection);
            } else {
                pipeline.select(selection, name)?;
            }
        }
        Ok(())
    }

    /// Select every environment, for commands that always act on all
    pub fn select_all(&mut self) {
        self.selection.insert_all(&self.registry);
    }

    /// Selected bindings, failing when nothing is selected
    pub fn targets(&self) -> Result<Vec<&EnvironmentBinding>> {
        self.selection.require(&self.registry)
    }

    /// Platform CLI builder
    #[must_use]
    pub fn platform(&self) -> Platform {
        Platform::new(&self.config.platform.cli)
    }

    /// Git command builder
    #[must_use]
    pub fn git(&self) -> Git {
        Git::new(&self.config.platform.git)
    }

    /// Deploy pipeline over this session
    #[must_use]
    pub fn pipeline(&self) -> DeployPipeline<'_> {
        DeployPipeline::new(
            &self.registry,
            self.runner.as_ref(),
            self.source.as_ref(),
            &self.hooks,
        )
        .with_git(self.git())
    }

    /// Deploy options from configuration, optionally forcing `continue`
    #[must_use]
    pub fn deploy_options(&self, keep_going: bool) -> DeployOptions {
        DeployOptions::new(&self.config.deploy.target_ref)
            .with_policy(self.failure_policy(keep_going))
    }

    /// Local backup storage
    #[must_use]
    pub fn backups(&self) -> BackupManager {
        BackupManager::new(self.root.join(&self.config.database.backup_dir))
    }

    /// Database workflows over this session
    #[must_use]
    pub fn database(&self, keep_going: bool) -> DatabaseWorkflow<'_> {
        DatabaseWorkflow::new(
            &self.registry,
            self.runner.as_ref(),
            &self.config.database,
            self.backups(),
        )
        .with_platform(self.platform())
        .with_production(&self.config.platform.production)
        .with_policy(self.failure_policy(keep_going))
    }

    const fn failure_policy(&self, keep_going: bool) -> FailurePolicy {
        if keep_going {
            FailurePolicy::Continue
        } else {
            self.config.deploy.failure_policy
        }
    }
}
