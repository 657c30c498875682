//! Read-only git queries against a sandbox.
//!
//! Every query goes through the [`CommandExecutor`], so a scripted executor
//! can stand in for git in tests. A query whose git call exits non-zero is
//! answered as "no" or "nothing"; only failing to run git at all is an error.

use std::path::Path;

use tracing::debug;

use super::executor::{quote_arg, CommandExecutor, CommandOutcome};
use crate::error::EnvironmentError;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter XY code, `??` for untracked.
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn is_conflicted(&self) -> bool {
        matches!(
            self.code.as_str(),
            "DD" | "AU" | "UD" | "UA" | "DU" | "AA" | "UU"
        )
    }
}

#[derive(Clone, Copy)]
pub struct GitProbe<'a> {
    executor: &'a dyn CommandExecutor,
    workdir: &'a Path,
}

impl<'a> GitProbe<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, workdir: &'a Path) -> Self {
        Self { executor, workdir }
    }

    /// True if the sandbox itself holds a repository (not a parent directory).
    pub fn is_repository(&self) -> Result<bool, EnvironmentError> {
        let out = self.git("rev-parse --git-dir")?;
        Ok(out.success && matches!(out.output.trim(), ".git" | "."))
    }

    /// Porcelain status entries, or `None` when git refuses (no repository).
    pub fn status(&self) -> Result<Option<Vec<StatusEntry>>, EnvironmentError> {
        let out = self.git("status --porcelain=v1 -uall")?;
        if !out.success {
            return Ok(None);
        }
        let entries = out
            .output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_status_line)
            .collect();
        Ok(Some(entries))
    }

    pub fn is_clean(&self) -> Result<bool, EnvironmentError> {
        Ok(matches!(self.status()?, Some(entries) if entries.is_empty()))
    }

    pub fn has_conflicts(&self) -> Result<bool, EnvironmentError> {
        Ok(self
            .status()?
            .is_some_and(|entries| entries.iter().any(StatusEntry::is_conflicted)))
    }

    pub fn commit_count(&self) -> Result<usize, EnvironmentError> {
        let out = self.git("rev-list --count HEAD")?;
        if !out.success {
            return Ok(0);
        }
        Ok(out.output.trim().parse().unwrap_or(0))
    }

    /// Subject lines of the commits reachable from HEAD, newest first.
    pub fn log_subjects(&self) -> Result<Vec<String>, EnvironmentError> {
        self.lines("log --format=%s")
    }

    pub fn head_message(&self) -> Result<Option<String>, EnvironmentError> {
        let out = self.git("log -1 --format=%B")?;
        Ok(out.success.then(|| out.output.trim().to_string()))
    }

    pub fn head_commit(&self) -> Result<Option<String>, EnvironmentError> {
        self.resolve("HEAD")
    }

    /// Commit a revision points at, or `None` if it does not resolve.
    pub fn resolve(&self, revision: &str) -> Result<Option<String>, EnvironmentError> {
        let spec = format!("{revision}^{{commit}}");
        let out = self.git(&format!("rev-parse --verify --quiet {}", quote_arg(&spec)))?;
        Ok(out.success.then(|| out.output.trim().to_string()))
    }

    pub fn current_branch(&self) -> Result<Option<String>, EnvironmentError> {
        let out = self.git("symbolic-ref --short -q HEAD")?;
        Ok(out.success.then(|| out.output.trim().to_string()))
    }

    pub fn branches(&self) -> Result<Vec<String>, EnvironmentError> {
        self.lines("branch --format=%(refname:short)")
    }

    pub fn tags(&self) -> Result<Vec<String>, EnvironmentError> {
        self.lines("tag --list")
    }

    pub fn remotes(&self) -> Result<Vec<String>, EnvironmentError> {
        self.lines("remote")
    }

    pub fn stash_count(&self) -> Result<usize, EnvironmentError> {
        Ok(self.lines("stash list")?.len())
    }

    pub fn is_tracked(&self, path: &str) -> Result<bool, EnvironmentError> {
        let out = self.git(&format!("ls-files --error-unmatch -- {}", quote_arg(path)))?;
        Ok(out.success)
    }

    /// True while a merge, cherry-pick, revert or rebase is half done.
    pub fn operation_in_progress(&self) -> bool {
        let git_dir = self.workdir.join(".git");
        ["MERGE_HEAD", "CHERRY_PICK_HEAD", "REVERT_HEAD", "rebase-merge", "rebase-apply"]
            .iter()
            .any(|marker| git_dir.join(marker).exists())
    }

    fn lines(&self, args: &str) -> Result<Vec<String>, EnvironmentError> {
        let out = self.git(args)?;
        if !out.success {
            return Ok(Vec::new());
        }
        Ok(out
            .output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn git(&self, args: &str) -> Result<CommandOutcome, EnvironmentError> {
        let line = format!("git {args}");
        let out = self.executor.execute(&line, self.workdir).ran()?;
        debug!(command = %line, success = out.success, "git probe");
        Ok(out)
    }
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Some(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    let code = line.get(..2)?.to_string();
    let mut path = line.get(3..)?.trim().to_string();
    if let Some((_, renamed)) = path.split_once(" -> ") {
        path = renamed.trim().to_string();
    }
    Some(StatusEntry { code, path })
}
