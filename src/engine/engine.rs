//! The game engine: one command in, one [`CommandResult`] out.
//!
//! The engine owns the session lifecycle (`NotStarted -> Active ->
//! Completed | Exited`), the current room's sandbox lease, and the most
//! recent validation result. A room whose setup failed is prepared again, on
//! a fresh sandbox, before the next pass-through command runs. Nothing that
//! goes wrong below it escapes [`GameEngine::process`]; environment failures
//! come back as failed results.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::command::{parse_command, Command};
use super::result::{CommandResult, ResultType};
use crate::challenge::{ChallengeContext, ValidationResult};
use crate::config::EngineConfig;
use crate::domain::{Game, SandboxPolicy, SessionSnapshot};
use crate::error::{EnvironmentError, TransitionError};
use crate::exec::{CommandExecutor, SandboxAllocator, SandboxLease, SandboxPaths};

const NO_HINT: &str = "No hint available yet. Try something, then ask again.";
const SESSION_ENDED: &str = "The session has ended.";
const VICTORY: &str = "*** You have cleared the dungeon! ***";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Active,
    Completed,
    /// Left explicitly; `completed` records whether the game was won first.
    Exited { completed: bool },
}

impl SessionState {
    pub fn is_over(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Exited { .. })
    }
}

pub struct GameEngine {
    game: Game,
    executor: Arc<dyn CommandExecutor>,
    allocator: Arc<dyn SandboxAllocator>,
    sandbox_prefix: String,
    passthrough_programs: Vec<String>,
    state: SessionState,
    lease: Option<SandboxLease>,
    /// The current room's setup has not succeeded yet.
    setup_pending: bool,
    last_validation: Option<ValidationResult>,
}

impl GameEngine {
    pub fn new(
        game: Game,
        executor: Arc<dyn CommandExecutor>,
        allocator: Arc<dyn SandboxAllocator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            game,
            executor,
            allocator,
            sandbox_prefix: config.sandbox_prefix.clone(),
            passthrough_programs: config.passthrough_programs.clone(),
            state: SessionState::NotStarted,
            lease: None,
            setup_pending: false,
            last_validation: None,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sandbox(&self) -> Option<&SandboxPaths> {
        self.lease.as_ref().map(SandboxLease::paths)
    }

    pub fn last_validation(&self) -> Option<&ValidationResult> {
        self.last_validation.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.game.snapshot(Utc::now())
    }

    /// Enter the current room and describe it. Calling this again once the
    /// session is running just describes the room.
    #[instrument(skip_all, fields(room = %self.game.current_room_id()))]
    pub fn start(&mut self) -> CommandResult {
        if self.state != SessionState::NotStarted {
            return self.look();
        }
        info!(player = self.game.player().name(), "session started");
        self.state = SessionState::Active;
        let prepared = self.enter_current_room();
        self.sync_completion();

        let mut result = self.look();
        if self.game.is_completed() {
            result.message.push_str("\n\n");
            result.message.push_str(VICTORY);
        }
        if let Err(err) = prepared {
            result.success = false;
            let _ = write!(
                result.message,
                "\n\nThe room could not be prepared: {err}\n\
                 It will be prepared again before your next command runs."
            );
        }
        result
    }

    /// Process one line of player input.
    #[instrument(skip_all, fields(room = %self.game.current_room_id()))]
    pub fn process(&mut self, line: &str) -> CommandResult {
        if self.state == SessionState::NotStarted {
            return CommandResult::fail(ResultType::Unknown, "The session has not started yet.");
        }
        let command = parse_command(line, self.game.current_room(), &self.passthrough_programs);
        debug!(?command, "dispatching");
        if self.state.is_over() && !command.class().available_after_session() {
            return Self::session_ended();
        }

        match command {
            Command::Help => self.help(),
            Command::Status => self.status(),
            Command::Look => self.look(),
            Command::Hint => self.hint(),
            Command::Exit => self.exit(),
            Command::Move(direction) => self.take_exit(&direction),
            Command::PassThrough(line) => self.pass_through(&line),
            Command::Answer(choice) => self.answer(choice),
            Command::Unknown(line) => Self::unknown(&line),
        }
    }

    fn session_ended() -> CommandResult {
        CommandResult::fail(ResultType::SessionEnded, SESSION_ENDED)
    }

    fn unknown(line: &str) -> CommandResult {
        let message = if line.is_empty() {
            "Say something. Type `help` for the commands you know.".to_string()
        } else {
            format!("Unknown command: {line}. Type `help` for the commands you know.")
        };
        CommandResult::fail(ResultType::Unknown, message)
    }

    fn help(&self) -> CommandResult {
        let mut text = String::from(
            "Commands:\n  \
             look             describe this room\n  \
             status           show your progress\n  \
             hint             get a nudge for the current challenge\n  \
             answer <n>       answer a question by option number\n  \
             go <exit>        leave through an exit (or just type its name)\n  \
             exit             leave the dungeon (progress is saved)\n",
        );
        let _ = write!(
            text,
            "\nAnything starting with {} runs in this room's sandbox.",
            self.passthrough_programs
                .iter()
                .map(|p| format!("`{p}`"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        CommandResult::ok(ResultType::Help, text)
    }

    fn status(&self) -> CommandResult {
        let player = self.game.player();
        let elapsed = Utc::now().signed_duration_since(player.game_started());
        let challenge = match self.game.current_room().challenge() {
            None => "none",
            Some(_) if self.game.current_challenge_satisfied() => "complete",
            Some(_) => "in progress",
        };
        let text = format!(
            "Adventurer: {}\n\
             Room: {}\n\
             Moves: {}\n\
             Rooms cleared: {}/{}\n\
             Challenges completed: {}\n\
             Current challenge: {}\n\
             Time in the dungeon: {}m {:02}s",
            player.name(),
            self.game.current_room().name(),
            player.move_count(),
            player.completed_rooms().len(),
            self.game.room_count(),
            player.completed_challenges().len(),
            challenge,
            elapsed.num_minutes(),
            elapsed.num_seconds().rem_euclid(60),
        );
        CommandResult::ok(ResultType::Status, text)
    }

    fn look(&self) -> CommandResult {
        CommandResult::ok(ResultType::Look, self.describe_room())
    }

    fn describe_room(&self) -> String {
        let room = self.game.current_room();
        let satisfied = self.game.current_challenge_satisfied();
        let mut text = format!("== {} ==", room.name());
        if !room.description().is_empty() {
            let _ = write!(text, "\n{}", room.description().trim_end());
        }

        if let Some(challenge) = room.challenge() {
            let _ = write!(
                text,
                "\n\n[{}] {}",
                challenge.kind().label(),
                challenge.description().trim_end()
            );
            if let Some(quiz) = challenge.as_quiz() {
                let _ = write!(text, "\n{}", quiz.question());
                for (i, option) in quiz.options().iter().enumerate() {
                    let _ = write!(text, "\n  {}) {}", i + 1, option);
                }
            }
            if satisfied {
                text.push_str("\n(complete)");
            }
        }

        if let Some(paths) = self.sandbox() {
            let _ = write!(text, "\n\nSandbox: {}", paths.primary().display());
            for (name, path) in paths.auxiliaries() {
                let _ = write!(text, "\n  {name}: {}", path.display());
            }
        }

        if room.exits().is_empty() {
            if room.is_end() {
                text.push_str("\n\nThere is no way further. This is the end of the dungeon.");
            }
        } else {
            let exits: Vec<&str> = room.exits().keys().map(String::as_str).collect();
            let _ = write!(text, "\n\nExits: {}", exits.join(", "));
            if !satisfied {
                text.push_str(" (sealed until the challenge is complete)");
            }
        }
        text
    }

    fn hint(&self) -> CommandResult {
        let hint = match self.game.current_room().challenge() {
            None => None,
            Some(challenge) => match challenge.as_quiz() {
                Some(quiz) => quiz.hint().map(str::to_string),
                None => self
                    .last_validation
                    .as_ref()
                    .and_then(|validation| validation.hint.clone()),
            },
        };
        CommandResult::ok(ResultType::Hint, hint.unwrap_or_else(|| NO_HINT.to_string()))
    }

    fn exit(&mut self) -> CommandResult {
        if let SessionState::Exited { .. } = self.state {
            return Self::session_ended();
        }
        let completed = self.game.is_completed();
        self.state = SessionState::Exited { completed };
        info!(completed, "session exited");
        let player = self.game.player();
        CommandResult::ok(
            ResultType::Exit,
            format!(
                "You leave the dungeon after {} moves, with {} challenge(s) behind you.",
                player.move_count(),
                player.completed_challenges().len()
            ),
        )
    }

    fn take_exit(&mut self, direction: &str) -> CommandResult {
        if let Err(err) = self.game.take_exit(direction).map(|_| ()) {
            debug!(%err, "move rejected");
            return self.rejected_move(&err);
        }
        info!(to = %self.game.current_room_id(), "entered room");
        self.last_validation = None;
        let prepared = self.enter_current_room();
        self.sync_completion();

        let mut message = format!("You go {direction}.\n\n{}", self.describe_room());
        if self.game.is_completed() {
            message.push_str("\n\n");
            message.push_str(VICTORY);
        }
        match prepared {
            Ok(()) => CommandResult::ok(ResultType::Movement, message),
            Err(err) => {
                let _ = write!(
                    message,
                    "\n\nThe room could not be prepared: {err}\n\
                     It will be prepared again before your next command runs."
                );
                CommandResult::fail(ResultType::Movement, message)
                    .with_hint(ValidationResult::environment(&err).hint)
            }
        }
    }

    fn rejected_move(&self, err: &TransitionError) -> CommandResult {
        match err {
            TransitionError::ChallengeIncomplete { .. } => CommandResult::fail(
                ResultType::Movement,
                "The way is sealed. Complete this room's challenge first.",
            )
            .with_hint(
                self.last_validation
                    .as_ref()
                    .and_then(|validation| validation.hint.clone()),
            ),
            TransitionError::NoSuchExit { direction, .. } if direction.is_empty() => {
                CommandResult::fail(ResultType::Movement, "Go where?")
            }
            TransitionError::NoSuchExit { direction, .. } => CommandResult::fail(
                ResultType::Movement,
                format!("You can't go '{direction}' from here."),
            ),
        }
    }

    /// Lease a sandbox for the current room and run its challenge setup,
    /// unless the challenge is already complete.
    fn enter_current_room(&mut self) -> Result<(), EnvironmentError> {
        let reuse = match self.game.current_room().sandbox_policy() {
            SandboxPolicy::Reuse => self.lease.take().map(SandboxLease::into_primary),
            SandboxPolicy::Fresh => {
                self.lease = None;
                None
            }
        };
        let prepared = self.prepare_room(reuse);
        self.setup_pending = prepared.is_err();
        prepared
    }

    /// Throw away the sandbox of a room whose setup failed and prepare it
    /// from scratch.
    fn retry_setup(&mut self) -> Result<(), EnvironmentError> {
        info!("retrying room setup");
        self.lease = None;
        let prepared = self.prepare_room(None);
        self.setup_pending = prepared.is_err();
        prepared
    }

    fn prepare_room(&mut self, reuse: Option<PathBuf>) -> Result<(), EnvironmentError> {
        let room = self.game.current_room();
        let lease = SandboxLease::acquire(
            self.allocator.clone(),
            &self.sandbox_prefix,
            room.auxiliary_sandboxes(),
            reuse,
        )
        .inspect_err(|err| warn!(%err, "sandbox allocation failed"))?;
        let lease = self.lease.insert(lease);

        let Some(challenge) = room.challenge() else {
            return Ok(());
        };
        if self.game.current_challenge_satisfied() {
            return Ok(());
        }
        let ctx = ChallengeContext::new(self.executor.as_ref(), lease.paths());
        challenge
            .setup(&ctx)
            .inspect_err(|err| warn!(challenge = %challenge.id(), %err, "challenge setup failed"))
    }

    fn pass_through(&mut self, line: &str) -> CommandResult {
        if self.setup_pending {
            if let Err(err) = self.retry_setup() {
                return CommandResult::fail(
                    ResultType::Command,
                    format!("The room could not be prepared: {err}\nYour command was not run."),
                )
                .with_hint(ValidationResult::environment(&err).hint);
            }
        }
        let Some(lease) = &self.lease else {
            return CommandResult::fail(
                ResultType::Command,
                "This room has no sandbox to run commands in.",
            );
        };
        let outcome = self.executor.execute(line, lease.primary());
        info!(command = line, success = outcome.success, "pass-through command");

        let mut message = match outcome.environment_error() {
            Some(err) => err.to_string(),
            None => outcome.transcript(),
        };
        let mut hint = None;
        if let Some(validation) = self.revalidate() {
            if !message.is_empty() {
                message.push_str("\n\n");
            }
            if validation.success {
                message.push_str("Challenge complete! ");
                message.push_str(&validation.message);
                if self.game.is_completed() {
                    message.push_str("\n\n");
                    message.push_str(VICTORY);
                }
            } else {
                message.push_str("Challenge: ");
                message.push_str(&validation.message);
                hint = validation.hint;
            }
        }
        CommandResult {
            kind: ResultType::Command,
            success: outcome.success,
            message,
            hint,
        }
    }

    /// Re-check the current room's challenge against the sandbox, marking it
    /// complete on first success. `None` if there is nothing to check.
    fn revalidate(&mut self) -> Option<ValidationResult> {
        let challenge = self.game.current_room().challenge()?;
        if !challenge.reads_sandbox() || self.game.current_challenge_satisfied() {
            return None;
        }
        let lease = self.lease.as_ref()?;
        let ctx = ChallengeContext::new(self.executor.as_ref(), lease.paths());
        let validation = match challenge.validate(&ctx) {
            Ok(validation) => validation,
            Err(err) => {
                warn!(challenge = %challenge.id(), %err, "validation failed to run");
                ValidationResult::environment(&err)
            }
        };
        debug!(success = validation.success, "challenge validated");
        self.last_validation = Some(validation.clone());
        if validation.success {
            self.mark_complete();
        }
        Some(validation)
    }

    fn answer(&mut self, choice: Option<usize>) -> CommandResult {
        let already_done = self.game.current_challenge_satisfied();
        let Some(quiz) = self
            .game
            .current_challenge_mut()
            .and_then(|challenge| challenge.as_quiz_mut())
        else {
            return CommandResult::fail(ResultType::Unknown, "There is no question to answer here.");
        };
        if already_done {
            return CommandResult::ok(ResultType::Answer, "You have already answered this one.");
        }
        let Some(index) = choice else {
            return CommandResult::fail(
                ResultType::Answer,
                "Answer with the number of an option, e.g. `answer 2`.",
            );
        };
        if let Err(err) = quiz.submit_answer(index) {
            return CommandResult::fail(ResultType::Answer, err.to_string());
        }
        let validation = quiz.validate();
        self.last_validation = Some(validation.clone());

        let mut result = CommandResult::from_validation(ResultType::Answer, &validation);
        if validation.success {
            self.mark_complete();
            if self.game.is_completed() {
                result.message.push_str("\n\n");
                result.message.push_str(VICTORY);
            } else {
                result.message.push_str(" The way forward is open.");
            }
        }
        result
    }

    fn mark_complete(&mut self) {
        if self.game.complete_current_challenge() {
            info!("game completed");
        }
        self.sync_completion();
    }

    fn sync_completion(&mut self) {
        if self.state == SessionState::Active && self.game.is_completed() {
            self.state = SessionState::Completed;
        }
    }
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("room", self.game.current_room_id())
            .field("state", &self.state)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}
