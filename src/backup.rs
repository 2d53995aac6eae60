//! Local storage of pulled database backups
//!
//! Dumps live under `<backup_dir>/<environment>/<backup id>.dump`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// File extension of pulled dumps
pub const DUMP_EXTENSION: &str = "dump";

/// Information about a database backup stored locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    /// Environment the backup was pulled from
    pub environment: String,
    /// Platform backup identifier
    pub backup_id: String,
    /// Path to the backup file
    pub file_path: PathBuf,
    /// Size of the backup file in bytes
    pub size_bytes: u64,
    /// Hex SHA-256 of the file
    pub checksum: String,
    /// Last modification time
    pub timestamp: DateTime<Utc>,
}

/// Manages the local backup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupManager {
    /// Directory where backups are stored
    pub backup_dir: PathBuf,
}

impl BackupManager {
    /// Create a new backup manager
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(backup_dir: PathBuf) -> Self {
        Self { backup_dir }
    }

    /// Directory holding one environment's dumps
    #[must_use]
    pub fn environment_dir(&self, environment: &str) -> PathBuf {
        self.backup_dir.join(environment)
    }

    /// Where a given backup is downloaded to
    #[must_use]
    pub fn backup_path(&self, environment: &str, backup_id: &str) -> PathBuf {
        self.environment_dir(environment)
            .join(format!("{backup_id}.{DUMP_EXTENSION}"))
    }

    /// Create the environment directory and return the dump path
    ///
    /// Fails with `InvalidInput` unless `backup_id` is a plain identifier.
    pub fn prepare(&self, environment: &str, backup_id: &str) -> io::Result<PathBuf> {
        if !is_backup_id(backup_id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{backup_id}' is not a backup identifier"),
            ));
        }
        fs::create_dir_all(self.environment_dir(environment))?;
        Ok(self.backup_path(environment, backup_id))
    }

    /// Describe a downloaded dump
    pub fn inspect(&self, environment: &str, file_path: &Path) -> io::Result<BackupInfo> {
        let metadata = fs::metadata(file_path)?;
        let backup_id = file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(BackupInfo {
            environment: environment.to_string(),
            backup_id,
            file_path: file_path.to_path_buf(),
            size_bytes: metadata.len(),
            checksum: checksum(file_path)?,
            timestamp: metadata.modified().map(DateTime::<Utc>::from)?,
        })
    }

    /// Dumps pulled for an environment, oldest first
    pub fn list_backups(&self, environment: &str) -> io::Result<Vec<BackupInfo>> {
        let dir = self.environment_dir(environment);
        let mut backups = Vec::new();

        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == DUMP_EXTENSION) {
                    backups.push(self.inspect(environment, &path)?);
                }
            }
        }

        backups.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        Ok(backups)
    }
}

/// Hex SHA-256 of a file
pub fn checksum(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

/// Backup identifier from a platform backup listing
///
/// The listing must be ordered oldest to newest, one backup per line, with
/// the identifier as the first whitespace separated token; its last
/// non-blank line is the backup that was just captured. Listings in another
/// layout (newest first, or trailed by `=== Restores` / `=== Copies`
/// sections) yield `None` rather than a wrong id, since their last line
/// does not start with an identifier.
#[must_use]
pub fn parse_backup_id(listing: &str) -> Option<&str> {
    listing
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())?
        .split_whitespace()
        .next()
        .filter(|token| is_backup_id(token))
}

/// Letters, digits, `-` and `_` only, with at least one digit (`b101`, `a007`)
#[must_use]
pub fn is_backup_id(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
