//! The external command executor.
//!
//! [`CommandExecutor`] is the only seam between the engine and the wrapped
//! tool. It never fails: spawn failures, timeouts and non-zero exits all come
//! back as a [`CommandOutcome`], and callers decide which of those matter.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::process::run_with_timeout;
use crate::config::EngineConfig;
use crate::error::EnvironmentError;

/// How an invocation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The process ran to completion. `None` means it was killed by a signal.
    Exited(Option<i32>),
    /// The program could not be started at all.
    SpawnFailed,
    /// The deadline passed and the process was killed.
    TimedOut(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    pub output: String,
    pub error: String,
    pub kind: OutcomeKind,
}

impl CommandOutcome {
    pub fn exited(
        command: impl Into<String>,
        code: Option<i32>,
        output: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            success: code == Some(0),
            output: output.into(),
            error: error.into(),
            kind: OutcomeKind::Exited(code),
        }
    }

    pub fn spawn_failed(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: String::new(),
            error: detail.into(),
            kind: OutcomeKind::SpawnFailed,
        }
    }

    pub fn timed_out(
        command: impl Into<String>,
        timeout: Duration,
        partial: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: partial.into(),
            error: format!("timed out after {timeout:?}"),
            kind: OutcomeKind::TimedOut(timeout),
        }
    }

    /// The environment failure behind this outcome, if the command never got
    /// to report an exit status of its own.
    pub fn environment_error(&self) -> Option<EnvironmentError> {
        match self.kind {
            OutcomeKind::Exited(_) => None,
            OutcomeKind::SpawnFailed => Some(EnvironmentError::Spawn {
                command: self.command.clone(),
                detail: self.error.clone(),
            }),
            OutcomeKind::TimedOut(timeout) => Some(EnvironmentError::TimedOut {
                command: self.command.clone(),
                timeout,
            }),
        }
    }

    /// Keep the outcome if the process ran, whatever its exit code.
    pub fn ran(self) -> Result<Self, EnvironmentError> {
        match self.environment_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Keep the outcome only if the process ran and exited zero.
    pub fn succeeded(self) -> Result<Self, EnvironmentError> {
        let outcome = self.ran()?;
        if outcome.success {
            return Ok(outcome);
        }
        let detail = if outcome.error.trim().is_empty() {
            format!("exit status {:?}", outcome.kind)
        } else {
            outcome.error.trim().to_string()
        };
        Err(EnvironmentError::CommandFailed {
            command: outcome.command,
            detail,
        })
    }

    /// Combined stdout and stderr, for showing to the player.
    pub fn transcript(&self) -> String {
        match (self.output.trim_end(), self.error.trim_end()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Runs one command line in a working directory.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command_line: &str, workdir: &Path) -> CommandOutcome;
}

/// Executor that spawns real processes.
#[derive(Clone, Debug)]
pub struct SystemExecutor {
    timeout: Duration,
    output_limit_bytes: usize,
    env: Vec<(String, String)>,
}

impl SystemExecutor {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
            env: Vec::new(),
        }
    }

    /// Executor configured with the timeout, output limit and commit
    /// identity from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::from_secs(config.command_timeout_secs),
            config.output_limit_bytes,
        )
        .with_env("GIT_AUTHOR_NAME", &config.git_author_name)
        .with_env("GIT_AUTHOR_EMAIL", &config.git_author_email)
        .with_env("GIT_COMMITTER_NAME", &config.git_author_name)
        .with_env("GIT_COMMITTER_EMAIL", &config.git_author_email)
        .with_env("GIT_TERMINAL_PROMPT", "0")
        .with_env("GIT_PAGER", "cat")
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl CommandExecutor for SystemExecutor {
    #[instrument(skip_all, fields(command = command_line, workdir = %workdir.display()))]
    fn execute(&self, command_line: &str, workdir: &Path) -> CommandOutcome {
        let argv = match split_command_line(command_line) {
            Ok(argv) if !argv.is_empty() => argv,
            Ok(_) => return CommandOutcome::spawn_failed(command_line, "empty command"),
            Err(detail) => return CommandOutcome::spawn_failed(command_line, detail),
        };

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).current_dir(workdir);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = match run_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "command could not be run");
                return CommandOutcome::spawn_failed(command_line, format!("{err:#}"));
            }
        };

        let stdout = tidy_output(&String::from_utf8_lossy(&output.stdout), workdir);
        let mut stderr = tidy_output(&String::from_utf8_lossy(&output.stderr), workdir);
        if output.truncated_bytes > 0 {
            stderr.push_str(&format!(
                "\n[output truncated by {} bytes]",
                output.truncated_bytes
            ));
        }

        if output.timed_out {
            return CommandOutcome::timed_out(command_line, self.timeout, stdout);
        }
        debug!(exit_code = ?output.status.code(), "command finished");
        CommandOutcome::exited(command_line, output.status.code(), stdout, stderr)
    }
}

/// Replace the sandbox's absolute path with `.` so output reads the same on
/// every machine.
fn tidy_output(text: &str, workdir: &Path) -> String {
    let root = workdir.display().to_string();
    if root.is_empty() || root == "/" {
        return text.to_string();
    }
    text.replace(&root, ".")
}

/// Split a command line into arguments.
///
/// Supports single quotes (literal), double quotes (with `\"` and `\\`
/// escapes) and backslash escapes outside quotes. No globbing, variables or
/// redirection.
pub fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_arg = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => return Err("trailing backslash".to_string()),
                }
            }
            ch if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            ch => {
                in_arg = true;
                current.push(ch);
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// Quote one argument so [`split_command_line`] gives it back unchanged.
pub fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | '\\'));
    if plain {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
