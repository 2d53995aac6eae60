//! Running external commands
//!
//! Every external program (git, the platform CLI, curl, `pg_restore`) goes
//! through a [`CommandRunner`]. The system runner echoes each command line
//! before running it and passes output straight through; a non-zero exit
//! becomes [`DeployError::ExecutionFailed`]. Nothing is ever retried.

use crate::error::{DeployError, Result};
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// An argv plus extra environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CommandLine {
    /// Start a command line for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Build from a full argv, program first
    ///
    /// Returns `None` for an empty argv.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args))
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, without the program
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables
    #[must_use]
    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.envs.iter().map(|(k, v)| (k, v)));
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Runs external commands on behalf of the pipeline and workflows
pub trait CommandRunner {
    /// Echo and run a command with inherited stdio
    fn run(&self, command: &CommandLine) -> Result<()>;

    /// Run a command and return its standard output
    fn run_capturing(&self, command: &CommandLine) -> Result<String>;
}

/// Runner backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    working_dir: Option<PathBuf>,
}

impl SystemRunner {
    /// Runner using the process working directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that starts every command in `dir`
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    fn command(&self, line: &CommandLine) -> Command {
        let mut command = line.to_command();
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

// Echoing the command line is the point of this runner
#[allow(clippy::disallowed_methods)]
impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<()> {
        println!("{command}");
        info!(command = %command, "Running command");

        let status = self
            .command(command)
            .status()
            .map_err(|source| spawn_error(command, source))?;
        check_status(command, status)
    }

    fn run_capturing(&self, command: &CommandLine) -> Result<String> {
        debug!(command = %command, "Running command for output");

        let output = self
            .command(command)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| spawn_error(command, source))?;
        check_status(command, output.status)?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn spawn_error(command: &CommandLine, source: std::io::Error) -> DeployError {
    warn!(command = %command, error = %source, "Failed to start command");
    DeployError::Spawn {
        command: command.to_string(),
        source,
    }
}

fn check_status(command: &CommandLine, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    warn!(command = %command, code = ?status.code(), "Command failed");
    Err(DeployError::ExecutionFailed {
        command: command.to_string(),
        code: status.code(),
    })
}
