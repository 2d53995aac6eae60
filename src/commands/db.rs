//! Database commands

use crate::session::Session;
use anyhow::Result;
use tracing::info;

/// Handle db migrate
pub fn handle_migrate(session: &Session, keep_going: bool) -> Result<()> {
    session
        .database(keep_going)
        .migrate_selection(session.selection())?;
    Ok(())
}

/// Handle db pull
#[allow(clippy::disallowed_methods)]
pub fn handle_pull(session: &Session, keep_going: bool) -> Result<()> {
    let pulled = session
        .database(keep_going)
        .pull_selection(session.selection())?;

    for backup in &pulled {
        println!(
            "📦 {}: {} ({} bytes, sha256 {})",
            backup.environment,
            backup.file_path.display(),
            backup.size_bytes,
            backup.checksum
        );
    }
    info!(count = pulled.len(), "Database pull finished");
    Ok(())
}

/// Handle db transfer
#[allow(clippy::disallowed_methods)]
pub fn handle_transfer(session: &Session, keep_going: bool) -> Result<()> {
    let transferred = session.database(keep_going).transfer(session.selection())?;

    if transferred.is_empty() {
        println!("Nothing to transfer: only production was selected.");
    }
    for outcome in &transferred {
        println!("✅ {} restored from {}", outcome.target, outcome.source_app);
    }
    Ok(())
}

/// Handle db backups: list locally pulled dumps
#[allow(clippy::disallowed_methods)]
pub fn handle_backups(session: &Session) -> Result<()> {
    let manager = session.backups();

    for binding in session.targets()? {
        let backups = manager.list_backups(&binding.name)?;
        println!(
            "💾 {} ({})",
            binding.name,
            manager.environment_dir(&binding.name).display()
        );

        if backups.is_empty() {
            println!("   No backups pulled yet. Use 'multideploy -e {} db pull'.", binding.name);
        }
        for backup in backups {
            println!(
                "   {}  {}  {} bytes",
                backup.backup_id,
                backup.timestamp.format("%Y-%m-%d %H:%M:%S"),
                backup.size_bytes
            );
        }
        println!();
    }
    Ok(())
}
