//! Test doubles: a scripted git, a recording allocator and room builders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::challenge::{Challenge, QuizChallenge, RepositoryChallenge, Rule};
use crate::config::EngineConfig;
use crate::domain::{Game, Player, Room};
use crate::engine::GameEngine;
use crate::error::EnvironmentError;
use crate::exec::{
    split_command_line, CommandExecutor, CommandOutcome, SandboxAllocator, TempSandboxAllocator,
};

const NOT_A_REPOSITORY: &str =
    "fatal: not a git repository (or any of the parent directories): .git";

#[derive(Debug, Default)]
struct FakeGitState {
    initialized: bool,
    commits: Vec<String>,
    commands: Vec<String>,
}

/// A stand-in for git that tracks just enough state to drive challenges:
/// whether `git init` ran and which commits were made. Commands it does not
/// model succeed with no output. Every command line is recorded.
#[derive(Debug, Default)]
pub struct FakeGit {
    state: Mutex<FakeGitState>,
    responses: Mutex<HashMap<String, CommandOutcome>>,
    one_shot: Mutex<HashMap<String, CommandOutcome>>,
    missing: bool,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation fails to spawn, as if git were not installed.
    pub fn missing_git(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Answer `line` with `outcome` instead of simulating it.
    pub fn with_response(self, line: &str, outcome: CommandOutcome) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(line.to_string(), outcome);
        }
        self
    }

    /// Answer the next `line` with `outcome`, then go back to simulating it.
    pub fn with_response_once(self, line: &str, outcome: CommandOutcome) -> Self {
        if let Ok(mut one_shot) = self.one_shot.lock() {
            one_shot.insert(line.to_string(), outcome);
        }
        self
    }

    /// Command lines seen so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().map(|state| state.commits.len()).unwrap_or(0)
    }

    fn simulate(state: &mut FakeGitState, line: &str, argv: &[String]) -> CommandOutcome {
        let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
        if args.first() == Some(&"init") {
            state.initialized = true;
            return CommandOutcome::exited(
                line,
                Some(0),
                "Initialized empty Git repository in ./.git/\n",
                "",
            );
        }
        if !state.initialized {
            return CommandOutcome::exited(line, Some(128), "", NOT_A_REPOSITORY);
        }
        let ok = |out: String| CommandOutcome::exited(line, Some(0), out, "");
        let no_head = || CommandOutcome::exited(line, Some(128), "", "fatal: bad revision 'HEAD'");

        match args.as_slice() {
            ["rev-parse", "--git-dir"] => ok(".git\n".to_string()),
            ["commit", rest @ ..] => {
                let message = rest
                    .iter()
                    .position(|arg| {
                        arg.starts_with('-') && !arg.starts_with("--") && arg.ends_with('m')
                    })
                    .and_then(|i| rest.get(i + 1))
                    .map(|m| m.to_string())
                    .unwrap_or_default();
                state.commits.push(message.clone());
                ok(format!("[main {:07x}] {message}\n", state.commits.len()))
            }
            ["rev-list", "--count", "HEAD"] if state.commits.is_empty() => no_head(),
            ["rev-list", "--count", "HEAD"] => ok(format!("{}\n", state.commits.len())),
            ["log", ..] if state.commits.is_empty() => no_head(),
            ["log", "--format=%s"] => {
                let subjects: Vec<&str> = state.commits.iter().rev().map(String::as_str).collect();
                ok(format!("{}\n", subjects.join("\n")))
            }
            ["log", "-1", "--format=%B"] => ok(format!(
                "{}\n",
                state.commits.last().map(String::as_str).unwrap_or_default()
            )),
            ["symbolic-ref", ..] => ok("main\n".to_string()),
            ["branch", ..] if state.commits.is_empty() => ok(String::new()),
            ["branch", ..] => ok("main\n".to_string()),
            _ => ok(String::new()),
        }
    }
}

impl CommandExecutor for FakeGit {
    fn execute(&self, command_line: &str, _workdir: &Path) -> CommandOutcome {
        let Ok(mut state) = self.state.lock() else {
            return CommandOutcome::spawn_failed(command_line, "fake git state poisoned");
        };
        state.commands.push(command_line.to_string());
        if self.missing {
            return CommandOutcome::spawn_failed(
                command_line,
                "No such file or directory (os error 2)",
            );
        }
        if let Some(outcome) = self
            .one_shot
            .lock()
            .ok()
            .and_then(|mut one_shot| one_shot.remove(command_line))
        {
            return outcome;
        }
        if let Some(outcome) = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(command_line).cloned())
        {
            return outcome;
        }
        let argv = match split_command_line(command_line) {
            Ok(argv) if !argv.is_empty() => argv,
            Ok(_) => return CommandOutcome::spawn_failed(command_line, "empty command"),
            Err(detail) => return CommandOutcome::spawn_failed(command_line, detail),
        };
        if argv[0] != "git" {
            return CommandOutcome::exited(command_line, Some(0), "", "");
        }
        Self::simulate(&mut state, command_line, &argv)
    }
}

/// Real temporary directories, with every allocation and cleanup recorded.
#[derive(Debug)]
pub struct RecordingAllocator {
    inner: TempSandboxAllocator,
    _root: tempfile::TempDir,
    created: Mutex<Vec<PathBuf>>,
    cleaned: Mutex<Vec<PathBuf>>,
}

impl RecordingAllocator {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("allocator root");
        Self {
            inner: TempSandboxAllocator::in_dir(root.path()),
            _root: root,
            created: Mutex::new(Vec::new()),
            cleaned: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn cleaned(&self) -> Vec<PathBuf> {
        self.cleaned.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Directories created but not yet cleaned up.
    pub fn live(&self) -> Vec<PathBuf> {
        let cleaned = self.cleaned();
        self.created()
            .into_iter()
            .filter(|path| !cleaned.contains(path))
            .collect()
    }
}

impl Default for RecordingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxAllocator for RecordingAllocator {
    fn create_directory(&self, prefix: &str) -> Result<PathBuf, EnvironmentError> {
        let path = self.inner.create_directory(prefix)?;
        if let Ok(mut created) = self.created.lock() {
            created.push(path.clone());
        }
        Ok(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn cleanup(&self, path: &Path) {
        if let Ok(mut cleaned) = self.cleaned.lock() {
            cleaned.push(path.to_path_buf());
        }
        self.inner.cleanup(path);
    }
}

/// Start room whose challenge is `git init`.
pub fn init_room(id: &str, next: &str) -> Room {
    Room::new(id, format!("{id} room"))
        .with_description("An empty vault.")
        .with_challenge(Challenge::repository(
            format!("{id}-init"),
            "Initialize a repository.",
            RepositoryChallenge::new()
                .with_rule(Rule::RepositoryInitialized)
                .with_hint("Try `git init`."),
        ))
        .with_exit("forward", next)
        .start()
}

/// A quiz whose correct answer is option 2 (index 1).
pub fn quiz_room(id: &str, next: &str) -> Room {
    Room::new(id, format!("{id} room"))
        .with_challenge(Challenge::quiz(
            format!("{id}-quiz"),
            "Answer the riddle.",
            QuizChallenge::new(
                "Which command records staged changes?",
                vec!["git add".to_string(), "git commit".to_string(), "git push".to_string()],
                1,
            )
            .with_hint("It makes a commit."),
        ))
        .with_exit("forward", next)
}

pub fn end_room(id: &str) -> Room {
    Room::new(id, format!("{id} room"))
        .with_description("Daylight.")
        .end()
}

/// vault (init) -> scroll (quiz) -> hall (end).
pub fn three_rooms() -> Vec<Room> {
    vec![
        init_room("vault", "scroll"),
        quiz_room("scroll", "hall"),
        end_room("hall"),
    ]
}

pub fn new_game(rooms: Vec<Room>) -> Game {
    Game::new(Player::new("tester", Utc::now()), rooms).expect("valid room graph")
}

/// An engine over `rooms` backed by [`FakeGit`] and a [`RecordingAllocator`].
pub fn fake_engine(rooms: Vec<Room>) -> (GameEngine, Arc<FakeGit>, Arc<RecordingAllocator>) {
    let git = Arc::new(FakeGit::new());
    let allocator = Arc::new(RecordingAllocator::new());
    let engine = GameEngine::new(
        new_game(rooms),
        git.clone(),
        allocator.clone(),
        &EngineConfig::default(),
    );
    (engine, git, allocator)
}
