//! Declarative success rules for repository challenges.
//!
//! Rules are read from room files, e.g.
//!
//! ```toml
//! rules = [
//!     { rule = "repository_initialized" },
//!     { rule = "min_commits", count = 2, hint = "Commit twice." },
//! ]
//! ```

use serde::Deserialize;

use super::ChallengeContext;
use crate::error::EnvironmentError;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    RepositoryInitialized,
    WorkingTreeClean,
    MinCommits { count: usize },
    /// Each entry may be a glob pattern; it must match at least one path.
    FilesExist { paths: Vec<String> },
    FileContains { path: String, text: String },
    FileTracked { path: String },
    BranchExists { name: String },
    OnBranch { name: String },
    TagExists { name: String },
    MinStashes { count: usize },
    NoConflicts,
    RemoteExists { name: String },
    HeadMessageContains { text: String },
}

impl Rule {
    /// Player-facing name of the criterion.
    pub fn label(&self) -> String {
        match self {
            Rule::RepositoryInitialized => "the repository is initialized".to_string(),
            Rule::WorkingTreeClean => "the working tree is clean".to_string(),
            Rule::MinCommits { count: 1 } => "at least 1 commit exists".to_string(),
            Rule::MinCommits { count } => format!("at least {count} commits exist"),
            Rule::FilesExist { paths } => format!("file(s) exist: {}", paths.join(", ")),
            Rule::FileContains { path, text } => format!("{path} contains \"{text}\""),
            Rule::FileTracked { path } => format!("{path} is tracked by git"),
            Rule::BranchExists { name } => format!("branch '{name}' exists"),
            Rule::OnBranch { name } => format!("'{name}' is checked out"),
            Rule::TagExists { name } => format!("tag '{name}' exists"),
            Rule::MinStashes { count: 1 } => "at least 1 stash entry exists".to_string(),
            Rule::MinStashes { count } => format!("at least {count} stash entries exist"),
            Rule::NoConflicts => "there are no unresolved conflicts".to_string(),
            Rule::RemoteExists { name } => format!("remote '{name}' is configured"),
            Rule::HeadMessageContains { text } => {
                format!("the latest commit message mentions \"{text}\"")
            }
        }
    }

    /// Check the rule against the sandbox. Read-only.
    pub fn evaluate(&self, ctx: &ChallengeContext<'_>) -> Result<bool, EnvironmentError> {
        let git = ctx.git();
        match self {
            Rule::RepositoryInitialized => git.is_repository(),
            Rule::WorkingTreeClean => git.is_clean(),
            Rule::MinCommits { count } => Ok(git.commit_count()? >= *count),
            Rule::FilesExist { paths } => Ok(paths.iter().all(|pattern| path_exists(ctx, pattern))),
            Rule::FileContains { path, text } => {
                Ok(ctx.read_file(path).is_some_and(|contents| contents.contains(text.as_str())))
            }
            Rule::FileTracked { path } => git.is_tracked(path),
            Rule::BranchExists { name } => Ok(git.branches()?.iter().any(|b| b == name)),
            Rule::OnBranch { name } => Ok(git.current_branch()?.as_deref() == Some(name.as_str())),
            Rule::TagExists { name } => Ok(git.tags()?.iter().any(|t| t == name)),
            Rule::MinStashes { count } => Ok(git.stash_count()? >= *count),
            Rule::NoConflicts => Ok(git.is_repository()? && !git.has_conflicts()?),
            Rule::RemoteExists { name } => Ok(git.remotes()?.iter().any(|r| r == name)),
            Rule::HeadMessageContains { text } => Ok(git
                .head_message()?
                .is_some_and(|message| message.contains(text.as_str()))),
        }
    }
}

fn path_exists(ctx: &ChallengeContext<'_>, pattern: &str) -> bool {
    let full = ctx.workdir().join(pattern);
    if full.exists() {
        return true;
    }
    let Some(full) = full.to_str() else {
        return false;
    };
    match glob::glob(full) {
        Ok(mut matches) => matches.any(|entry| entry.is_ok()),
        Err(_) => false,
    }
}

/// A rule as written in a room file, with an optional per-rule hint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub hint: Option<String>,
}

impl From<Rule> for RuleSpec {
    fn from(rule: Rule) -> Self {
        Self { rule, hint: None }
    }
}
