use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "multideploy.toml";

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error occurred while reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error occurred
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Parsed but semantically invalid
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure for `multideploy`
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// External programs and platform-wide names
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Deploy behaviour
    #[serde(default)]
    pub deploy: DeploySettings,
    /// Database workflow settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Commands attached to pipeline stages
    #[serde(default)]
    pub hooks: HookCommands,
    /// Settings applied to every environment
    #[serde(default)]
    pub shared: SharedSettings,
    /// Environments in declaration order
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

/// Platform CLI configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform CLI program
    ///
    /// Its `pg:backups` listing must print backups oldest first, with the
    /// backup id leading the last line; `db pull` takes the id from there.
    pub cli: String,
    /// Git program
    pub git: String,
    /// Name of the canonical production environment
    pub production: String,
    /// Stack used when neither the environment nor `[shared]` names one
    pub default_stack: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            cli: "heroku".to_string(),
            git: "git".to_string(),
            production: "production".to_string(),
            default_stack: "cedar".to_string(),
        }
    }
}

/// What to do when one environment's push fails
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch at the first failure
    #[default]
    Abort,
    /// Record the failure and move on to the next environment
    Continue,
}

/// Deploy configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DeploySettings {
    /// Remote ref the local branch is pushed to
    pub target_ref: String,
    /// Batch behaviour on push failure
    pub failure_policy: FailurePolicy,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            target_ref: "master".to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Database workflow configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Where pulled dumps are stored, relative to the project root
    pub backup_dir: String,
    /// Local database name, `{app}` and `{env}` are substituted
    pub local_name: String,
    /// Host of the local database server
    pub host: String,
    /// Command run on the platform to migrate
    pub migrate: Vec<String>,
    /// Local command recreating the database, empty for dropdb/createdb
    pub reset: Vec<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backup_dir: "db/backups".to_string(),
            local_name: "{app}_development".to_string(),
            host: "localhost".to_string(),
            migrate: vec!["rake".to_string(), "db:migrate".to_string()],
            reset: Vec::new(),
        }
    }
}

impl DatabaseSettings {
    /// Local database name for an environment's app
    #[must_use]
    pub fn local_database(&self, environment: &str, app: &str) -> String {
        self.local_name
            .replace("{app}", app)
            .replace("{env}", environment)
    }
}

/// Commands attached to each pipeline stage, as argv lists
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct HookCommands {
    /// Once, before any environment is deployed
    pub before_deploy: Vec<Vec<String>>,
    /// Before each environment's push
    pub before_each_deploy: Vec<Vec<String>>,
    /// After each environment's push
    pub after_each_deploy: Vec<Vec<String>>,
    /// Once, after every environment was deployed
    pub after_deploy: Vec<Vec<String>>,
    /// Whenever an environment is selected
    pub on_environment_switch: Vec<Vec<String>>,
}

/// Settings applied to every environment
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct SharedSettings {
    /// Stack for environments that do not name one
    pub stack: Option<String>,
    /// Collaborator emails
    pub collaborators: Vec<String>,
    /// Add-ons to provision
    pub addons: Vec<String>,
    /// Config vars, overridden per environment
    pub config: BTreeMap<String, String>,
}

/// Environment-specific configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EnvironmentConfig {
    /// Environment name, e.g. `staging`
    pub name: String,
    /// Platform application name
    pub app: String,
    /// Git remote, derived from `app` when absent
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Platform stack
    #[serde(default)]
    pub stack: Option<String>,
    /// Extra collaborators
    #[serde(default)]
    pub collaborators: Vec<String>,
    /// Extra add-ons
    #[serde(default)]
    pub addons: Vec<String>,
    /// Custom domains
    #[serde(default)]
    pub domains: Vec<String>,
    /// Config vars
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Everything `setup` needs for one environment, with shared settings merged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSetup {
    /// Collaborator emails, shared first
    pub collaborators: Vec<String>,
    /// Add-ons, shared first
    pub addons: Vec<String>,
    /// Custom domains
    pub domains: Vec<String>,
    /// Config vars, environment values win
    pub config: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for env in &self.environments {
            if env.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "environment with an empty name".to_string(),
                ));
            }
            if env.app.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "environment '{}' has no app",
                    env.name
                )));
            }
        }
        if self.database.migrate.is_empty() {
            return Err(ConfigError::Invalid(
                "database.migrate must name a command".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up an environment's raw configuration
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|env| env.name == name)
    }

    /// Stack an environment runs on
    #[must_use]
    pub fn stack_for(&self, env: &EnvironmentConfig) -> String {
        env.stack
            .clone()
            .or_else(|| self.shared.stack.clone())
            .unwrap_or_else(|| self.platform.default_stack.clone())
    }

    /// Git remote an environment is pushed to
    #[must_use]
    pub fn remote_url_for(env: &EnvironmentConfig) -> String {
        env.remote_url
            .clone()
            .unwrap_or_else(|| format!("git@heroku.com:{}.git", env.app))
    }

    /// Merge shared and environment settings for `setup`
    #[must_use]
    pub fn setup_for(&self, env: &EnvironmentConfig) -> EnvironmentSetup {
        let mut config = self.shared.config.clone();
        config.extend(env.config.clone());

        EnvironmentSetup {
            collaborators: merge_unique(&self.shared.collaborators, &env.collaborators),
            addons: merge_unique(&self.shared.addons, &env.addons),
            domains: env.domains.clone(),
            config,
        }
    }
}

fn merge_unique(shared: &[String], own: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(shared.len() + own.len());
    for item in shared.iter().chain(own) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
