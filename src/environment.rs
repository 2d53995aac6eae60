//! Environment registry and per-invocation selection
//!
//! The registry maps environment names to the platform application they
//! deploy to. Declaration order is preserved everywhere: listing, deploy
//! order and backup order all follow the order of the configuration file.

use crate::config::Config;
use crate::error::{DeployError, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// Name that selects every environment at once
pub const ALL: &str = "all";

/// Binding of a logical environment to a concrete remote application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentBinding {
    /// Environment name, unique within the registry
    pub name: String,
    /// Platform application name
    pub app: String,
    /// Git remote the code is pushed to
    pub remote_url: String,
    /// Platform stack
    pub stack: String,
}

impl EnvironmentBinding {
    /// Create a new binding
    pub fn new(
        name: impl Into<String>,
        app: impl Into<String>,
        remote_url: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            app: app.into(),
            remote_url: remote_url.into(),
            stack: stack.into(),
        }
    }
}

/// Read-only, ordered collection of environment bindings
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    bindings: Vec<EnvironmentBinding>,
}

impl EnvironmentRegistry {
    /// Build a registry, rejecting duplicate and reserved names
    pub fn new(bindings: Vec<EnvironmentBinding>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for binding in &bindings {
            if binding.name == ALL {
                return Err(DeployError::ReservedEnvironmentName {
                    name: binding.name.clone(),
                });
            }
            if !seen.insert(binding.name.as_str()) {
                return Err(DeployError::DuplicateEnvironment {
                    name: binding.name.clone(),
                });
            }
        }
        Ok(Self { bindings })
    }

    /// Build the registry from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let bindings = config
            .environments
            .iter()
            .map(|env| {
                EnvironmentBinding::new(
                    env.name.clone(),
                    env.app.clone(),
                    Config::remote_url_for(env),
                    config.stack_for(env),
                )
            })
            .collect();
        Self::new(bindings)
    }

    /// Every binding in declaration order
    #[must_use]
    pub fn all(&self) -> &[EnvironmentBinding] {
        &self.bindings
    }

    /// Number of declared environments
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no environment is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Look up a single binding by name
    pub fn get(&self, name: &str) -> Result<&EnvironmentBinding> {
        self.position(name).map(|index| &self.bindings[index])
    }

    /// Resolve a name, or `all`, to bindings in declaration order
    pub fn resolve(&self, name_or_all: &str) -> Result<Vec<&EnvironmentBinding>> {
        if name_or_all == ALL {
            return Ok(self.bindings.iter().collect());
        }
        self.get(name_or_all).map(|binding| vec![binding])
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.bindings
            .iter()
            .position(|binding| binding.name == name)
            .ok_or_else(|| DeployError::UnknownEnvironment {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.name.as_str()).collect()
    }
}

/// The environments one command invocation acts on
///
/// Stored as registry positions, so iteration always follows declaration
/// order no matter in which order environments were selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSelection {
    positions: BTreeSet<usize>,
}

impl ActiveSelection {
    /// An empty selection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one environment; selecting it again is a no-op
    pub fn insert(&mut self, registry: &EnvironmentRegistry, name: &str) -> Result<()> {
        let position = registry.position(name)?;
        self.positions.insert(position);
        Ok(())
    }

    /// Add every declared environment
    pub fn insert_all(&mut self, registry: &EnvironmentRegistry) {
        self.positions.extend(0..registry.len());
    }

    /// Whether nothing was selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Selected bindings in declaration order
    #[must_use]
    pub fn bindings<'r>(&self, registry: &'r EnvironmentRegistry) -> Vec<&'r EnvironmentBinding> {
        self.positions
            .iter()
            .filter_map(|&position| registry.bindings.get(position))
            .collect()
    }

    /// Selected bindings, failing when nothing was selected
    pub fn require<'r>(
        &self,
        registry: &'r EnvironmentRegistry,
    ) -> Result<Vec<&'r EnvironmentBinding>> {
        let bindings = self.bindings(registry);
        if bindings.is_empty() {
            return Err(DeployError::NoEnvironmentSelected);
        }
        Ok(bindings)
    }
}
