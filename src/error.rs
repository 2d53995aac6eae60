use crate::config::ConfigError;
use crate::hooks::Stage;
use std::fmt;
use thiserror::Error;

/// Custom error types for `multideploy`
#[derive(Error, Debug)]
pub enum DeployError {
    /// Environment name has no binding in the registry
    #[error("Unknown environment '{name}'. Available: {available}")]
    UnknownEnvironment {
        /// The name that was looked up
        name: String,
        /// Comma separated list of declared environments
        available: String,
    },

    /// Two environments share one name
    #[error("Environment '{name}' is declared more than once")]
    DuplicateEnvironment {
        /// The duplicated name
        name: String,
    },

    /// Environment name collides with a reserved word
    #[error("Environment name '{name}' is reserved")]
    ReservedEnvironmentName {
        /// The offending name
        name: String,
    },

    /// Command needs at least one environment
    #[error("No environment selected. Pass --env <NAME> or --all")]
    NoEnvironmentSelected,

    /// Working copy has no checked out branch
    #[error(
        "Unable to determine the current git branch while deploying {environment}, \
         please checkout the branch you'd like to deploy"
    )]
    NoCurrentBranch {
        /// Environment being deployed when detection failed
        environment: String,
    },

    /// External command exited unsuccessfully
    #[error("Command `{command}` failed with {}", describe_exit(.code))]
    ExecutionFailed {
        /// Command line as echoed to the operator
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// External command could not be started
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        /// Command line as echoed to the operator
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Git push for one environment failed
    #[error("Push to {environment} failed: {source}")]
    PushFailed {
        /// Target environment
        environment: String,
        /// Executor failure
        source: Box<DeployError>,
    },

    /// A lifecycle hook returned an error
    #[error("Hook {stage} failed{}: {source}", describe_environment(.environment))]
    HookFailed {
        /// Stage the hook was registered for
        stage: Stage,
        /// Environment in scope, if any
        environment: Option<String>,
        /// Hook failure
        source: Box<DeployError>,
    },

    /// Hook reported a failure of its own
    #[error("{message}")]
    Hook {
        /// Message supplied by the hook
        message: String,
    },

    /// One step of a multi-step workflow failed for an environment
    #[error("{step} failed for {environment}: {source}")]
    StepFailed {
        /// Environment being processed
        environment: String,
        /// Step name, e.g. `capture` or `restore`
        step: &'static str,
        /// Step failure
        source: Box<DeployError>,
    },

    /// Backup listing had no identifier on its last line
    #[error("Could not find a backup identifier in the backup listing of {app}")]
    MissingBackupIdentifier {
        /// Platform application that was listed
        app: String,
    },

    /// Platform returned something that is not a downloadable URL
    #[error("Backup URL '{url}' is not a valid http(s) URL")]
    InvalidBackupUrl {
        /// The URL as returned by the platform
        url: String,
    },

    /// Several environments failed under the continue policy
    #[error("{} environment(s) failed: {}", count_failures(.failures), describe_failures(.failures))]
    BatchFailed {
        /// Per environment failures, in processing order
        failures: Vec<EnvironmentFailure>,
    },

    /// Configuration error wrapper
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure recorded for one environment while the batch carried on
#[derive(Debug)]
pub struct EnvironmentFailure {
    /// Environment that failed
    pub environment: String,
    /// What went wrong
    pub error: DeployError,
}

impl fmt::Display for EnvironmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.environment, self.error)
    }
}

impl DeployError {
    /// Build a hook failure from a plain message
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
        }
    }

    /// Wrap an error as the failure of a named workflow step
    #[must_use]
    pub fn in_step(self, environment: &str, step: &'static str) -> Self {
        Self::StepFailed {
            environment: environment.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// Whether this error came from an external command exiting non-zero
    #[must_use]
    pub fn is_execution_failure(&self) -> bool {
        match self {
            Self::ExecutionFailed { .. } => true,
            Self::PushFailed { source, .. }
            | Self::StepFailed { source, .. }
            | Self::HookFailed { source, .. } => source.is_execution_failure(),
            _ => false,
        }
    }
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "no exit status (terminated by signal)".to_string(),
        |code| format!("exit status {code}"),
    )
}

#[allow(clippy::ref_option)]
fn describe_environment(environment: &Option<String>) -> String {
    environment
        .as_deref()
        .map_or_else(String::new, |env| format!(" for {env}"))
}

const fn count_failures(failures: &[EnvironmentFailure]) -> usize {
    failures.len()
}

fn describe_failures(failures: &[EnvironmentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for `multideploy` operations
pub type Result<T> = std::result::Result<T, DeployError>;
