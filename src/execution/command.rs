//! External process invocation.
//!
//! [`ExternalCommand`] wraps an external executable (the point format
//! normalizer in the default pipeline) with a builder for arguments and
//! timeout. The child inherits the caller's environment and working directory.
//!
//! ```rust
//! use lasmesh::ExternalCommand;
//! use std::time::Duration;
//!
//! let cmd = ExternalCommand::builder("las2las")
//!     .args(["-f", "1.0", "in.las", "out.las"])
//!     .timeout(Duration::from_secs(600))
//!     .build();
//!
//! assert_eq!(cmd.program(), "las2las");
//! assert_eq!(cmd.args().len(), 4);
//! ```
//!
//! # Error Handling
//!
//! - **Non-zero exit code**: [`run_checked`](ExternalCommand::run_checked)
//!   returns [`TaskError::Conversion`] with the exit code and stderr
//! - **Timeout**: [`TaskError::Timeout`] (transient); the child is killed when
//!   the pending future is dropped
//! - **Spawn failure**: [`TaskError::ExecutionFailed`] (e.g. program not found)

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::core::task::TaskError;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// An external command ready to run.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    /// Program to execute
    program: String,
    /// Command arguments
    args: Vec<String>,
    /// Execution timeout
    timeout: Option<Duration>,
}

impl ExternalCommand {
    /// Create a new builder for a command.
    pub fn builder(program: impl Into<String>) -> ExternalCommandBuilder {
        ExternalCommandBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the command arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the timeout duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run the command to completion, capturing its output.
    pub async fn run(&self) -> Result<CommandOutput, TaskError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(program = %self.program, args = ?self.args, "spawning external command");

        let output = match self.timeout {
            Some(duration) => timeout(duration, cmd.output())
                .await
                .map_err(|_| TaskError::Timeout(duration))?
                .map_err(|e| {
                    TaskError::ExecutionFailed(format!("failed to run '{}': {}", self.program, e))
                })?,
            None => cmd.output().await.map_err(|e| {
                TaskError::ExecutionFailed(format!("failed to run '{}': {}", self.program, e))
            })?,
        };

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the command and fail with [`TaskError::Conversion`] on a non-zero exit.
    pub async fn run_checked(&self) -> Result<CommandOutput, TaskError> {
        let output = self.run().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(TaskError::Conversion {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Builder for creating `ExternalCommand` instances.
#[derive(Debug, Clone)]
pub struct ExternalCommandBuilder {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ExternalCommandBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Build the `ExternalCommand`.
    pub fn build(self) -> ExternalCommand {
        ExternalCommand {
            program: self.program,
            args: self.args,
            timeout: self.timeout,
        }
    }
}
