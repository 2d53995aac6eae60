//! `multideploy` - deploy one codebase to many platform environments
//!
//! Environments (staging, production, ...) are declared in a configuration
//! file and bound to platform applications. A deploy runs lifecycle hooks
//! around a `git push` to each selected environment, one at a time, in
//! declaration order. Database workflows capture, pull and transfer
//! backups between environments.

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/// Local backup storage
pub mod backup;
/// Command line interface definitions
pub mod cli;
/// Command handlers
pub mod commands;
/// Configuration management for multideploy
pub mod config;
pub mod database;
pub mod environment;
/// Error types
pub mod error;
pub mod executor;
pub mod git;
pub mod hooks;
pub mod pipeline;
pub mod platform;
pub mod session;

pub use config::Config;
pub use environment::{ActiveSelection, EnvironmentBinding, EnvironmentRegistry};
pub use error::{DeployError, Result};
pub use executor::{CommandLine, CommandRunner, SystemRunner};
pub use pipeline::{DeployOptions, DeployPipeline};
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
