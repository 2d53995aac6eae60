//! Git commands and working copy queries

use crate::error::{DeployError, Result};
use crate::executor::CommandLine;
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

/// Builds git command lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Git {
    program: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Git {
    /// Use `program` as the git binary
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `git push <url> <flags...> <refspec>`
    #[must_use]
    pub fn push(&self, remote_url: &str, flags: &[String], refspec: &str) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("push")
            .arg(remote_url)
            .args(flags.iter().cloned())
            .arg(refspec)
    }

    /// `git remote add <name> <url>`
    #[must_use]
    pub fn remote_add(&self, name: &str, url: &str) -> CommandLine {
        CommandLine::new(&self.program).args(["remote", "add", name, url])
    }

    /// `git branch`, whose output [`parse_current_branch`] understands
    #[must_use]
    pub fn branch_listing(&self) -> CommandLine {
        CommandLine::new(&self.program).arg("branch")
    }
}

/// Source of the branch to deploy
pub trait SourceControl {
    /// Currently checked out branch, `None` when detached or unborn
    fn current_branch(&self) -> Result<Option<String>>;
}

/// The local git working copy
#[derive(Debug, Clone)]
pub struct GitWorkingCopy {
    git: Git,
    dir: PathBuf,
}

impl GitWorkingCopy {
    /// Working copy rooted at `dir`
    pub fn new(git: Git, dir: impl Into<PathBuf>) -> Self {
        Self {
            git,
            dir: dir.into(),
        }
    }
}

impl SourceControl for GitWorkingCopy {
    fn current_branch(&self) -> Result<Option<String>> {
        let line = self.git.branch_listing();
        debug!(command = %line, dir = %self.dir.display(), "Querying current branch");

        let output = Command::new(line.program())
            .args(line.get_args())
            .current_dir(&self.dir)
            .output()
            .map_err(|source| DeployError::Spawn {
                command: line.to_string(),
                source,
            })?;

        // Outside a repository there is no branch to deploy
        if !output.status.success() {
            debug!(code = ?output.status.code(), "git branch failed");
            return Ok(None);
        }
        Ok(parse_current_branch(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extract the checked out branch from `git branch` output
///
/// The current branch is the line starting with `* `. A detached HEAD is
/// listed as `* (HEAD detached at ...)` and yields `None`, as does output
/// without a marked line.
#[must_use]
pub fn parse_current_branch(listing: &str) -> Option<String> {
    static CURRENT: OnceLock<Regex> = OnceLock::new();
    let current =
        CURRENT.get_or_init(|| Regex::new(r"(?m)^\* (.+?)\s*$").expect("valid regex"));

    let branch = current.captures(listing)?.get(1)?.as_str();
    if branch.starts_with('(') {
        return None;
    }
    Some(branch.to_string())
}
