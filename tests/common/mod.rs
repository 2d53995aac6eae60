/// Shared test utilities for multideploy integration tests
use multideploy::error::{DeployError, Result};
use multideploy::executor::{CommandLine, CommandRunner};
use multideploy::git::SourceControl;
use multideploy::{EnvironmentBinding, EnvironmentRegistry};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Runner that records every command instead of running it
///
/// Captured output and failures are scripted by substring of the echoed
/// command line; the first matching rule wins.
///
/// Clones share one log, so a boxed clone can be handed to a session.
#[derive(Default, Clone)]
pub struct RecordingRunner {
    calls: Rc<RefCell<Vec<String>>>,
    envs: Rc<RefCell<Vec<Vec<(String, String)>>>>,
    outputs: Vec<(String, String)>,
    failures: Vec<(String, i32)>,
}

#[allow(dead_code)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `run_capturing` of a command containing `pattern` returns `output`
    pub fn with_output(mut self, pattern: &str, output: &str) -> Self {
        self.outputs.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Commands containing `pattern` exit with `code`
    pub fn failing_on(mut self, pattern: &str, code: i32) -> Self {
        self.failures.push((pattern.to_string(), code));
        self
    }

    /// Every command line seen, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Command lines containing `pattern`
    pub fn calls_matching(&self, pattern: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.contains(pattern))
            .collect()
    }

    /// Environment variables passed with each call
    pub fn envs(&self) -> Vec<Vec<(String, String)>> {
        self.envs.borrow().clone()
    }

    fn record(&self, command: &CommandLine) -> Result<String> {
        let line = command.to_string();
        self.calls.borrow_mut().push(line.clone());
        self.envs.borrow_mut().push(command.get_envs().to_vec());

        if let Some((_, code)) = self
            .failures
            .iter()
            .find(|(p, _)| line.contains(p.as_str()))
        {
            return Err(DeployError::ExecutionFailed {
                command: line,
                code: Some(*code),
            });
        }
        Ok(self
            .outputs
            .iter()
            .find(|(p, _)| line.contains(p.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandLine) -> Result<()> {
        self.record(command).map(drop)
    }

    fn run_capturing(&self, command: &CommandLine) -> Result<String> {
        self.record(command)
    }
}

/// Source control reporting a fixed branch and counting queries
#[derive(Clone)]
pub struct FixedBranch {
    branch: Option<String>,
    queries: Rc<Cell<usize>>,
}

#[allow(dead_code)]
impl FixedBranch {
    pub fn on(branch: &str) -> Self {
        Self {
            branch: Some(branch.to_string()),
            queries: Rc::new(Cell::new(0)),
        }
    }

    pub fn detached() -> Self {
        Self {
            branch: None,
            queries: Rc::new(Cell::new(0)),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl SourceControl for FixedBranch {
    fn current_branch(&self) -> Result<Option<String>> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.branch.clone())
    }
}

/// staging then production, as in the usual two-app setup
#[allow(dead_code)]
pub fn sample_registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(vec![
        EnvironmentBinding::new("staging", "myapp-staging", "git@h:staging.git", "cedar"),
        EnvironmentBinding::new("production", "myapp", "git@h:prod.git", "cedar"),
    ])
    .unwrap()
}

/// Three environments, production declared last
#[allow(dead_code)]
pub fn three_environment_registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(vec![
        EnvironmentBinding::new("staging", "myapp-staging", "git@h:staging.git", "cedar"),
        EnvironmentBinding::new("demo", "myapp-demo", "git@h:demo.git", "cedar"),
        EnvironmentBinding::new("production", "myapp", "git@h:prod.git", "cedar"),
    ])
    .unwrap()
}
