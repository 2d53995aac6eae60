/// List apps and add git remotes
pub mod apps;
/// Database migrate, pull, transfer and local backups
pub mod db;
/// Deploy and force deploy
pub mod deploy;
/// Per-environment platform calls (info, logs, console, ...)
pub mod inspect;
/// Provision apps from configuration
pub mod setup;
