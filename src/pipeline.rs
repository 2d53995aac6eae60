//! The deployment pipeline
//!
//! One deploy walks the selected environments in declaration order:
//!
//! ```text
//! before_deploy
//!   for each environment:
//!     before_each_deploy -> detect branch -> git push -> after_each_deploy
//! after_deploy
//! ```
//!
//! A missing branch stops everything before any push. A failed push stops
//! the batch under [`FailurePolicy::Abort`]; under
//! [`FailurePolicy::Continue`] it is recorded, the environment's
//! `after_each_deploy` is skipped and the batch carries on, failing with
//! [`DeployError::BatchFailed`] once `after_deploy` has run. A hook failure
//! or missing branch after such a failure still reports the recorded pushes.

use crate::config::FailurePolicy;
use crate::environment::{ActiveSelection, EnvironmentBinding, EnvironmentRegistry};
use crate::error::{DeployError, EnvironmentFailure, Result};
use crate::executor::CommandRunner;
use crate::git::{Git, SourceControl};
use crate::hooks::{HookContext, Hooks, Stage};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

/// Flag appended to the push by a force deploy
pub const FORCE_FLAG: &str = "--force";

/// Parameters of one deploy invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Extra `git push` flags, placed before the refspec
    pub push_flags: Vec<String>,
    /// Remote ref the branch is pushed to
    pub target_ref: String,
    /// Batch behaviour on push failure
    pub failure_policy: FailurePolicy,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            push_flags: Vec::new(),
            target_ref: "master".to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl DeployOptions {
    /// Options pushing to `target_ref`
    pub fn new(target_ref: impl Into<String>) -> Self {
        Self {
            target_ref: target_ref.into(),
            ..Self::default()
        }
    }

    /// Use a different failure policy
    #[must_use]
    pub const fn with_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// The same options with the force flag added once
    #[must_use]
    pub fn forced(mut self) -> Self {
        if !self.push_flags.iter().any(|flag| flag == FORCE_FLAG) {
            self.push_flags.push(FORCE_FLAG.to_string());
        }
        self
    }
}

/// Per-environment state of one deploy pass
#[derive(Debug)]
pub struct DeployContext<'a> {
    /// Environment being deployed
    pub environment: &'a EnvironmentBinding,
    /// Branch being pushed, once detected
    pub branch: Option<String>,
    /// Push flags of the whole invocation
    pub push_flags: &'a [String],
}

impl<'a> DeployContext<'a> {
    fn new(environment: &'a EnvironmentBinding, push_flags: &'a [String]) -> Self {
        Self {
            environment,
            branch: None,
            push_flags,
        }
    }

    fn hook_context<'c>(&'c self, stage: Stage, runner: &'c dyn CommandRunner) -> HookContext<'c> {
        HookContext {
            stage,
            environment: Some(self.environment),
            branch: self.branch.as_deref(),
            push_flags: self.push_flags,
            runner,
        }
    }
}

/// A successful push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// Environment name
    pub environment: String,
    /// Platform application
    pub app: String,
    /// Branch that was pushed
    pub branch: String,
    /// Push command line
    pub command: String,
}

/// Summary of a finished deploy
#[derive(Debug, Clone)]
pub struct DeployReport {
    /// Successful pushes in processing order
    pub pushed: Vec<PushOutcome>,
    /// When the deploy started
    pub started_at: DateTime<Utc>,
    /// When the deploy finished
    pub finished_at: DateTime<Utc>,
}

/// Sequences hooks and pushes over the selected environments
pub struct DeployPipeline<'a> {
    registry: &'a EnvironmentRegistry,
    runner: &'a dyn CommandRunner,
    source: &'a dyn SourceControl,
    hooks: &'a Hooks,
    git: Git,
}

impl<'a> DeployPipeline<'a> {
    /// Pipeline over `registry`, pushing through `runner`
    pub fn new(
        registry: &'a EnvironmentRegistry,
        runner: &'a dyn CommandRunner,
        source: &'a dyn SourceControl,
        hooks: &'a Hooks,
    ) -> Self {
        Self {
            registry,
            runner,
            source,
            hooks,
            git: Git::default(),
        }
    }

    /// Use a specific git program
    #[must_use]
    pub fn with_git(mut self, git: Git) -> Self {
        self.git = git;
        self
    }

    /// Select one environment and notify `on_environment_switch`
    ///
    /// The hook runs on every call, including repeated selection of the
    /// same environment.
    pub fn select(&self, selection: &mut ActiveSelection, name: &str) -> Result<()> {
        let binding = self.registry.get(name)?;
        selection.insert(self.registry, name)?;
        info!(environment = %binding.name, app = %binding.app, "Selected environment");

        self.hooks.invoke(&HookContext {
            stage: Stage::EnvironmentSwitch,
            environment: Some(binding),
            branch: None,
            push_flags: &[],
            runner: self.runner,
        })
    }

    /// Select every declared environment
    pub fn select_all(&self, selection: &mut ActiveSelection) {
        selection.insert_all(self.registry);
        info!(count = self.registry.len(), "Selected all environments");
    }

    /// Push the current branch to every selected environment
    #[allow(clippy::disallowed_methods)]
    pub fn deploy(
        &self,
        selection: &ActiveSelection,
        options: &DeployOptions,
    ) -> Result<DeployReport> {
        let targets = selection.require(self.registry)?;
        let started_at = Utc::now();
        info!(
            environments = targets.len(),
            flags = ?options.push_flags,
            policy = ?options.failure_policy,
            "Starting deploy"
        );

        self.invoke_batch(Stage::BeforeDeploy, options)?;

        let mut pushed = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();

        for environment in targets {
            println!("\n\nDeploying to {}...", environment.app);
            let mut context = DeployContext::new(environment, &options.push_flags);

            self.hooks
                .invoke(&context.hook_context(Stage::BeforeEachDeploy, self.runner))
                .map_err(|err| {
                    with_recorded(std::mem::take(&mut failures), &environment.name, err)
                })?;

            let branch = self.source.current_branch().map_err(|err| {
                with_recorded(std::mem::take(&mut failures), &environment.name, err)
            })?;
            let Some(branch) = branch else {
                error!(environment = %environment.name, "No current branch, aborting deploy");
                let err = DeployError::NoCurrentBranch {
                    environment: environment.name.clone(),
                };
                return Err(with_recorded(failures, &environment.name, err));
            };

            let refspec = format!("{branch}:{}", options.target_ref);
            let push = self
                .git
                .push(&environment.remote_url, &options.push_flags, &refspec);
            context.branch = Some(branch);

            if let Err(source) = self.runner.run(&push) {
                let failure = DeployError::PushFailed {
                    environment: environment.name.clone(),
                    source: Box::new(source),
                };
                match options.failure_policy {
                    FailurePolicy::Abort => {
                        error!(
                            environment = %environment.name,
                            error = %failure,
                            "Push failed, aborting deploy"
                        );
                        return Err(failure);
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            environment = %environment.name,
                            error = %failure,
                            "Push failed, continuing"
                        );
                        failures.push(EnvironmentFailure {
                            environment: environment.name.clone(),
                            error: failure,
                        });
                        continue;
                    }
                }
            }

            self.hooks
                .invoke(&context.hook_context(Stage::AfterEachDeploy, self.runner))
                .map_err(|err| {
                    with_recorded(std::mem::take(&mut failures), &environment.name, err)
                })?;
            println!();

            pushed.push(PushOutcome {
                environment: environment.name.clone(),
                app: environment.app.clone(),
                branch: context.branch.unwrap_or_default(),
                command: push.to_string(),
            });
        }

        if let Err(err) = self.invoke_batch(Stage::AfterDeploy, options) {
            return Err(with_recorded(failures, Stage::AfterDeploy.name(), err));
        }

        if !failures.is_empty() {
            return Err(DeployError::BatchFailed { failures });
        }

        info!(pushed = pushed.len(), "Deploy finished");
        Ok(DeployReport {
            pushed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Deploy with [`FORCE_FLAG`] added for this invocation only
    pub fn force_deploy(
        &self,
        selection: &ActiveSelection,
        options: &DeployOptions,
    ) -> Result<DeployReport> {
        self.deploy(selection, &options.clone().forced())
    }

    fn invoke_batch(&self, stage: Stage, options: &DeployOptions) -> Result<()> {
        self.hooks.invoke(&HookContext {
            stage,
            environment: None,
            branch: None,
            push_flags: &options.push_flags,
            runner: self.runner,
        })
    }
}

/// `err` alone, or appended to push failures already recorded under `Continue`
fn with_recorded(
    mut failures: Vec<EnvironmentFailure>,
    scope: &str,
    err: DeployError,
) -> DeployError {
    if failures.is_empty() {
        return err;
    }
    failures.push(EnvironmentFailure {
        environment: scope.to_string(),
        error: err,
    });
    DeployError::BatchFailed { failures }
}
