//! Lifecycle hooks around the deploy pipeline
//!
//! A stage holds an ordered list of callbacks. Callbacks get everything
//! they may need through [`HookContext`]; nothing is stashed in globals,
//! so the same stage can run once per environment without leftovers from
//! the previous run.

use crate::config::HookCommands;
use crate::environment::EnvironmentBinding;
use crate::error::{DeployError, Result};
use crate::executor::{CommandLine, CommandRunner};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Named extension points of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Once per deploy, before the first environment
    BeforeDeploy,
    /// Before each environment's push
    BeforeEachDeploy,
    /// After each successful push
    AfterEachDeploy,
    /// Once per deploy, after the last environment
    AfterDeploy,
    /// Whenever an environment is selected
    EnvironmentSwitch,
}

impl Stage {
    /// Every stage, in pipeline order
    pub const ALL: [Self; 5] = [
        Self::EnvironmentSwitch,
        Self::BeforeDeploy,
        Self::BeforeEachDeploy,
        Self::AfterEachDeploy,
        Self::AfterDeploy,
    ];

    /// Name used in configuration and logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeDeploy => "before_deploy",
            Self::BeforeEachDeploy => "before_each_deploy",
            Self::AfterEachDeploy => "after_each_deploy",
            Self::AfterDeploy => "after_deploy",
            Self::EnvironmentSwitch => "on_environment_switch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook gets to see when it runs
pub struct HookContext<'a> {
    /// Stage being run
    pub stage: Stage,
    /// Environment in scope; `None` for batch-level stages
    pub environment: Option<&'a EnvironmentBinding>,
    /// Branch being deployed, once known
    pub branch: Option<&'a str>,
    /// Extra push flags of this deploy invocation
    pub push_flags: &'a [String],
    /// Runner for hooks that shell out
    pub runner: &'a dyn CommandRunner,
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("stage", &self.stage)
            .field("environment", &self.environment.map(|e| &e.name))
            .field("branch", &self.branch)
            .field("push_flags", &self.push_flags)
            .finish_non_exhaustive()
    }
}

/// A registered callback
pub type HookFn = Box<dyn Fn(&HookContext<'_>) -> Result<()>>;

/// Callbacks per stage, run in registration order
#[derive(Default)]
pub struct Hooks {
    registered: HashMap<Stage, Vec<HookFn>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for stage in Stage::ALL {
            map.entry(&stage.name(), &self.count(stage));
        }
        map.finish()
    }
}

impl Hooks {
    /// No hooks at all; every stage is a no-op
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks running the commands listed in `[hooks]`
    #[must_use]
    pub fn from_commands(commands: &HookCommands) -> Self {
        let mut hooks = Self::new();
        let table = [
            (Stage::BeforeDeploy, &commands.before_deploy),
            (Stage::BeforeEachDeploy, &commands.before_each_deploy),
            (Stage::AfterEachDeploy, &commands.after_each_deploy),
            (Stage::AfterDeploy, &commands.after_deploy),
            (Stage::EnvironmentSwitch, &commands.on_environment_switch),
        ];
        for (stage, argvs) in table {
            for argv in argvs {
                if let Some(line) = CommandLine::from_argv(argv) {
                    hooks.register(stage, command_hook(line));
                }
            }
        }
        hooks
    }

    /// Append a callback to a stage
    pub fn register<F>(&mut self, stage: Stage, hook: F)
    where
        F: Fn(&HookContext<'_>) -> Result<()> + 'static,
    {
        self.registered
            .entry(stage)
            .or_default()
            .push(Box::new(hook));
    }

    /// Number of callbacks registered for a stage
    #[must_use]
    pub fn count(&self, stage: Stage) -> usize {
        self.registered.get(&stage).map_or(0, Vec::len)
    }

    /// Run a stage's callbacks; the first failure stops the stage
    pub fn invoke(&self, context: &HookContext<'_>) -> Result<()> {
        let Some(hooks) = self.registered.get(&context.stage) else {
            return Ok(());
        };
        debug!(
            stage = %context.stage,
            environment = ?context.environment.map(|e| &e.name),
            count = hooks.len(),
            "Running hooks"
        );
        for hook in hooks {
            hook(context).map_err(|source| DeployError::HookFailed {
                stage: context.stage,
                environment: context.environment.map(|e| e.name.clone()),
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

/// Environment variables a command hook receives
#[must_use]
pub fn hook_environment(context: &HookContext<'_>) -> Vec<(String, String)> {
    let mut vars = vec![(
        "MULTIDEPLOY_STAGE".to_string(),
        context.stage.name().to_string(),
    )];
    if let Some(env) = context.environment {
        vars.push(("MULTIDEPLOY_ENV".to_string(), env.name.clone()));
        vars.push(("MULTIDEPLOY_APP".to_string(), env.app.clone()));
        vars.push(("MULTIDEPLOY_REMOTE".to_string(), env.remote_url.clone()));
        vars.push(("MULTIDEPLOY_STACK".to_string(), env.stack.clone()));
    }
    if let Some(branch) = context.branch {
        vars.push(("MULTIDEPLOY_BRANCH".to_string(), branch.to_string()));
    }
    vars
}

fn command_hook(line: CommandLine) -> impl Fn(&HookContext<'_>) -> Result<()> {
    move |context| {
        let command = hook_environment(context)
            .into_iter()
            .fold(line.clone(), |command, (key, value)| command.env(key, value));
        context.runner.run(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NoopRunner;

    impl CommandRunner for NoopRunner {
        fn run(&self, _command: &CommandLine) -> Result<()> {
            Ok(())
        }

        fn run_capturing(&self, _command: &CommandLine) -> Result<String> {
            Ok(String::new())
        }
    }

    fn context<'a>(
        stage: Stage,
        environment: Option<&'a EnvironmentBinding>,
        runner: &'a dyn CommandRunner,
    ) -> HookContext<'a> {
        HookContext {
            stage,
            environment,
            branch: None,
            push_flags: &[],
            runner,
        }
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::EnvironmentSwitch.to_string(), "on_environment_switch");
        assert_eq!(Stage::BeforeEachDeploy.name(), "before_each_deploy");
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();
        for label in ["first", "second"] {
            let calls = Rc::clone(&calls);
            hooks.register(Stage::BeforeDeploy, move |_| {
                calls.borrow_mut().push(label);
                Ok(())
            });
        }

        hooks
            .invoke(&context(Stage::BeforeDeploy, None, &NoopRunner))
            .unwrap();
        assert_eq!(*calls.borrow(), ["first", "second"]);
    }

    #[test]
    fn test_failing_hook_stops_stage_and_names_it() {
        let calls = Rc::new(RefCell::new(0));
        let mut hooks = Hooks::new();
        hooks.register(Stage::AfterEachDeploy, |_| Err(DeployError::hook("smoke test failed")));
        let counter = Rc::clone(&calls);
        hooks.register(Stage::AfterEachDeploy, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        let staging =
            EnvironmentBinding::new("staging", "myapp-staging", "git@h:staging.git", "cedar");
        let err = hooks
            .invoke(&context(Stage::AfterEachDeploy, Some(&staging), &NoopRunner))
            .unwrap_err();

        assert_eq!(*calls.borrow(), 0);
        assert_eq!(
            err.to_string(),
            "Hook after_each_deploy failed for staging: smoke test failed"
        );
    }

    #[test]
    fn test_unregistered_stage_is_a_noop() {
        let hooks = Hooks::new();
        assert_eq!(hooks.count(Stage::AfterDeploy), 0);
        hooks
            .invoke(&context(Stage::AfterDeploy, None, &NoopRunner))
            .unwrap();
    }

    #[test]
    fn test_hook_environment_exposes_binding() {
        let staging =
            EnvironmentBinding::new("staging", "myapp-staging", "git@h:staging.git", "cedar");
        let mut ctx = context(Stage::AfterEachDeploy, Some(&staging), &NoopRunner);
        ctx.branch = Some("main");

        let vars = hook_environment(&ctx);
        assert!(vars.contains(&("MULTIDEPLOY_APP".to_string(), "myapp-staging".to_string())));
        assert!(vars.contains(&("MULTIDEPLOY_BRANCH".to_string(), "main".to_string())));
        assert!(vars.contains(&(
            "MULTIDEPLOY_STAGE".to_string(),
            "after_each_deploy".to_string()
        )));
    }

    #[test]
    fn test_from_commands_skips_empty_argv() {
        let commands = HookCommands {
            before_deploy: vec![vec!["echo".to_string(), "hi".to_string()], vec![]],
            ..HookCommands::default()
        };
        let hooks = Hooks::from_commands(&commands);
        assert_eq!(hooks.count(Stage::BeforeDeploy), 1);
        assert_eq!(hooks.count(Stage::AfterDeploy), 0);
    }
}
