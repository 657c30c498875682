//! Challenges gate progress out of a room.
//!
//! A challenge has two phases: `setup` prepares the sandbox once when the
//! room becomes current, and `validate` is re-run after every relevant player
//! action until it first succeeds. The variant is an explicit discriminant
//! ([`ChallengeKind`]) that both rendering and validation switch on.

pub mod quiz;
pub mod repository;
pub mod result;
pub mod rules;

use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use tracing::warn;

pub use quiz::{InvalidAnswer, QuizChallenge};
pub use repository::{RepositoryChallenge, SetupFn, SetupStep, ValidateFn};
pub use result::{Checklist, ValidationResult};
pub use rules::{Rule, RuleSpec};

use crate::domain::ChallengeId;
use crate::error::EnvironmentError;
use crate::exec::{CommandExecutor, CommandOutcome, GitProbe, SandboxPaths};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    Quiz,
    Scenario,
    Repository,
}

impl ChallengeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChallengeKind::Quiz => "quiz",
            ChallengeKind::Scenario => "scenario",
            ChallengeKind::Repository => "repository",
        }
    }
}

/// Variant data. Scenario and Repository share a shape; the tag only changes
/// how the challenge is presented.
#[derive(Clone, Debug)]
pub enum ChallengeBody {
    Quiz(QuizChallenge),
    Scenario(RepositoryChallenge),
    Repository(RepositoryChallenge),
}

#[derive(Clone, Debug)]
pub struct Challenge {
    id: ChallengeId,
    description: String,
    body: ChallengeBody,
}

impl Challenge {
    pub fn quiz(
        id: impl Into<ChallengeId>,
        description: impl Into<String>,
        quiz: QuizChallenge,
    ) -> Self {
        Self::with_body(id, description, ChallengeBody::Quiz(quiz))
    }

    pub fn scenario(
        id: impl Into<ChallengeId>,
        description: impl Into<String>,
        scenario: RepositoryChallenge,
    ) -> Self {
        Self::with_body(id, description, ChallengeBody::Scenario(scenario))
    }

    pub fn repository(
        id: impl Into<ChallengeId>,
        description: impl Into<String>,
        repository: RepositoryChallenge,
    ) -> Self {
        Self::with_body(id, description, ChallengeBody::Repository(repository))
    }

    fn with_body(
        id: impl Into<ChallengeId>,
        description: impl Into<String>,
        body: ChallengeBody,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            body,
        }
    }

    pub fn id(&self) -> &ChallengeId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ChallengeKind {
        match self.body {
            ChallengeBody::Quiz(_) => ChallengeKind::Quiz,
            ChallengeBody::Scenario(_) => ChallengeKind::Scenario,
            ChallengeBody::Repository(_) => ChallengeKind::Repository,
        }
    }

    pub fn body(&self) -> &ChallengeBody {
        &self.body
    }

    pub fn as_quiz(&self) -> Option<&QuizChallenge> {
        match &self.body {
            ChallengeBody::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    pub fn as_quiz_mut(&mut self) -> Option<&mut QuizChallenge> {
        match &mut self.body {
            ChallengeBody::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    /// Whether this challenge reads the sandbox and so must be re-checked
    /// after external commands.
    pub fn reads_sandbox(&self) -> bool {
        !matches!(self.body, ChallengeBody::Quiz(_))
    }

    /// Prepare the sandbox. Panics in challenge code surface as
    /// [`EnvironmentError::Panicked`].
    pub fn setup(&self, ctx: &ChallengeContext<'_>) -> Result<(), EnvironmentError> {
        guarded(|| match &self.body {
            ChallengeBody::Quiz(_) => Ok(()),
            ChallengeBody::Scenario(repo) | ChallengeBody::Repository(repo) => repo.setup(ctx),
        })
    }

    /// Evaluate the challenge against the sandbox as it is right now.
    pub fn validate(
        &self,
        ctx: &ChallengeContext<'_>,
    ) -> Result<ValidationResult, EnvironmentError> {
        guarded(|| match &self.body {
            ChallengeBody::Quiz(quiz) => Ok(quiz.validate()),
            ChallengeBody::Scenario(repo) | ChallengeBody::Repository(repo) => repo.validate(ctx),
        })
    }
}

/// Run challenge code, turning a panic into an environment error.
pub(crate) fn guarded<T>(
    f: impl FnOnce() -> Result<T, EnvironmentError>,
) -> Result<T, EnvironmentError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            warn!(detail = %detail, "challenge code panicked");
            Err(EnvironmentError::Panicked(detail))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// What challenge code gets to work with: the executor and the room's sandbox.
#[derive(Clone, Copy)]
pub struct ChallengeContext<'a> {
    executor: &'a dyn CommandExecutor,
    sandbox: &'a SandboxPaths,
}

impl<'a> ChallengeContext<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, sandbox: &'a SandboxPaths) -> Self {
        Self { executor, sandbox }
    }

    pub fn executor(&self) -> &'a dyn CommandExecutor {
        self.executor
    }

    pub fn sandbox(&self) -> &'a SandboxPaths {
        self.sandbox
    }

    pub fn workdir(&self) -> &'a Path {
        self.sandbox.primary()
    }

    pub fn auxiliary(&self, name: &str) -> Result<&'a Path, EnvironmentError> {
        self.sandbox
            .auxiliary(name)
            .ok_or_else(|| EnvironmentError::MissingAuxiliary(name.to_string()))
    }

    pub fn git(&self) -> GitProbe<'a> {
        GitProbe::new(self.executor, self.workdir())
    }

    pub fn git_in(&self, auxiliary: &str) -> Result<GitProbe<'a>, EnvironmentError> {
        Ok(GitProbe::new(self.executor, self.auxiliary(auxiliary)?))
    }

    /// Run a command in the primary sandbox; a non-zero exit is an error.
    pub fn run(&self, command: &str) -> Result<CommandOutcome, EnvironmentError> {
        let command = self.expand(command);
        self.executor.execute(&command, self.workdir()).succeeded()
    }

    /// Run a command in an auxiliary sandbox; a non-zero exit is an error.
    pub fn run_in(
        &self,
        auxiliary: &str,
        command: &str,
    ) -> Result<CommandOutcome, EnvironmentError> {
        let dir = self.auxiliary(auxiliary)?;
        let command = self.expand(command);
        self.executor.execute(&command, dir).succeeded()
    }

    /// Write a file relative to the primary sandbox, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<(), EnvironmentError> {
        let path = self.workdir().join(relative);
        let fs_err = |err: std::io::Error| EnvironmentError::Filesystem {
            path: path.clone(),
            detail: err.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(fs_err)?;
        }
        fs::write(&path, contents).map_err(fs_err)
    }

    /// Contents of a file relative to the primary sandbox, if readable.
    pub fn read_file(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.workdir().join(relative)).ok()
    }

    /// Expand `{sandbox}` and `{aux:<name>}` placeholders to paths.
    pub fn expand(&self, text: &str) -> String {
        let mut expanded = text.replace(
            "{sandbox}",
            &crate::exec::quote_arg(&self.workdir().display().to_string()),
        );
        for (name, path) in self.sandbox.auxiliaries() {
            expanded = expanded.replace(
                &format!("{{aux:{name}}}"),
                &crate::exec::quote_arg(&path.display().to_string()),
            );
        }
        expanded
    }
}
