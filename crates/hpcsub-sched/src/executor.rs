//! Shell command execution.
//!
//! Every interaction with a batch scheduler goes through [`CommandExecutor`].
//! Two capture styles exist because the schedulers' tools are driven
//! differently:
//!
//! - [`CommandExecutor::capture`] collects stdout, stderr and the exit code.
//! - [`CommandExecutor::run`] collects stdout and the exit code only; stderr
//!   is inherited by the calling process.
//!
//! [`ShellExecutor`] runs commands through `sh -c`. [`MockExecutor`] replays
//! canned outputs and records what was issued, for tests and dry runs.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{SchedError, SchedResult};

/// Exit code reported when a process was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Quote a word for `sh` unless it only contains characters that are safe bare.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./%:=@+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Output of one shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error (always empty in `run` mode).
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Set the stdout of this output.
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Whether the command exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// stdout, stderr and exit code captured.
    Capture,
    /// stdout and exit code captured, stderr inherited.
    Run,
}

/// Runs shell command strings on behalf of an adapter.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command capturing stdout, stderr and the exit code.
    async fn capture(&self, command: &str) -> SchedResult<CommandOutput>;

    /// Run a command capturing stdout and the exit code only.
    async fn run(&self, command: &str) -> SchedResult<CommandOutput>;
}

/// Executes commands with `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    /// Create a new shell executor.
    pub fn new() -> Self {
        Self
    }

    async fn spawn(command: &str, stderr: Stdio) -> SchedResult<std::process::Output> {
        debug!("exec: {}", command);
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .output()
            .await
            .map_err(|e| SchedError::CommandSpawn {
                command: command.to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn capture(&self, command: &str) -> SchedResult<CommandOutput> {
        let output = Self::spawn(command, Stdio::piped()).await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(SIGNALED_EXIT_CODE),
        })
    }

    async fn run(&self, command: &str) -> SchedResult<CommandOutput> {
        let output = Self::spawn(command, Stdio::inherit()).await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::new(),
            exit_code: output.status.code().unwrap_or(SIGNALED_EXIT_CODE),
        })
    }
}

/// Scripted executor that replays queued outputs in order.
///
/// Commands are recorded with the mode they were issued in. When the queue is
/// empty, a zero-exit output with empty stdout is returned.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<CommandOutput>>,
    issued: Mutex<Vec<(ExecMode, String)>>,
}

impl MockExecutor {
    /// Create a mock executor with no queued outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an output for the next command.
    pub fn respond(self, output: CommandOutput) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(output);
        self
    }

    /// Commands issued so far, in order.
    pub fn issued(&self) -> Vec<(ExecMode, String)> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Command strings issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.issued().into_iter().map(|(_, cmd)| cmd).collect()
    }

    fn next(&self, mode: ExecMode, command: &str) -> CommandOutput {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((mode, command.to_string()));
        let mut output = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default();
        if mode == ExecMode::Run {
            output.stderr.clear();
        }
        output
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn capture(&self, command: &str) -> SchedResult<CommandOutput> {
        Ok(self.next(ExecMode::Capture, command))
    }

    async fn run(&self, command: &str) -> SchedResult<CommandOutput> {
        Ok(self.next(ExecMode::Run, command))
    }
}
