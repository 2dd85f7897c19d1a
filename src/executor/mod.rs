//! Process execution for [`CliCommand`] values.
//!
//! Every invocation resolves to [`ExitData`]. Spawn errors, timeouts and
//! non-zero exits are reported as data, never as `Err`, so callers can turn
//! them into placeholder nodes.

use crate::protocol::{CliCommand, ToolFamily};
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

/// Default time a captured command may run before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitData {
    pub succeeded: bool,
    pub stdout: String,
    /// Error text: stderr of a failed process, or the spawn/timeout error.
    pub error: Option<String>,
}

impl ExitData {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            error: None,
        }
    }

    pub fn failure(stdout: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: stdout.into(),
            error: Some(error.into()),
        }
    }

    /// Human-readable failure text: the error if any, otherwise stdout.
    pub fn diagnostic(&self) -> String {
        match self.error.as_deref().map(str::trim) {
            Some(err) if !err.is_empty() => err.to_string(),
            _ => self.stdout.trim().to_string(),
        }
    }
}

/// Lines emitted by a long-lived watch process. Dropping the stream kills it.
pub type WatchStream = BoxStream<'static, String>;

/// Runs commands on behalf of the fetcher, poller and CLI.
pub trait Executor: Send + Sync {
    /// Run to completion with captured output.
    fn execute<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, ExitData>;

    /// Start a long-lived process and stream its stdout line by line.
    fn watch(&self, command: &CliCommand) -> Result<WatchStream>;

    /// Run attached to the current terminal (inherited stdio).
    fn execute_in_terminal<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, Result<()>>;
}

/// Explicit binary locations per tool family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub tkn: Option<PathBuf>,
    pub kubectl: Option<PathBuf>,
}

impl ToolPaths {
    /// The program to spawn for a tool, falling back to a `PATH` lookup.
    pub fn program(&self, tool: ToolFamily) -> PathBuf {
        let configured = match tool {
            ToolFamily::Tkn => self.tkn.as_ref(),
            ToolFamily::Kubectl => self.kubectl.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool.binary_name()))
    }
}

/// [`Executor`] backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    paths: ToolPaths,
    timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ToolPaths::default(), DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ProcessExecutor {
    pub fn new(paths: ToolPaths, timeout: Duration) -> Self {
        Self { paths, timeout }
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    fn command(&self, command: &CliCommand) -> TokioCommand {
        let mut cmd = TokioCommand::new(self.paths.program(command.tool()));
        cmd.args(command.args()).kill_on_drop(true);
        cmd
    }

    async fn run_captured(&self, command: &CliCommand) -> ExitData {
        tracing::debug!(command = %command, "executing");
        let mut cmd = self.command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return ExitData::failure(
                    "",
                    format!("{} timed out after {}s", command.tool(), self.timeout.as_secs()),
                );
            }
            Ok(Err(e)) => return ExitData::failure("", format!("{}: {}", command.tool(), e)),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() {
            if !stderr.is_empty() {
                tracing::debug!(command = %command, stderr = %stderr, "command wrote to stderr");
            }
            ExitData::success(stdout)
        } else if stderr.is_empty() {
            ExitData::failure(stdout, format!("{} exited with {}", command.tool(), output.status))
        } else {
            ExitData::failure(stdout, stderr)
        }
    }
}

impl Executor for ProcessExecutor {
    fn execute<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, ExitData> {
        Box::pin(self.run_captured(command))
    }

    fn watch(&self, command: &CliCommand) -> Result<WatchStream> {
        tracing::debug!(command = %command, "starting watch");
        let mut child = self
            .command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Command(format!("failed to spawn `{}`: {}", command, e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Command(format!("no stdout for `{}`", command)))?;

        // The child rides along in the stream state so dropping the stream kills it.
        let lines = BufReader::new(stdout).lines();
        let stream = stream::unfold((child, lines), |(child, mut lines)| async move {
            match lines.next_line().await {
                Ok(Some(line)) => Some((line, (child, lines))),
                Ok(None) | Err(_) => None,
            }
        });
        Ok(Box::pin(stream))
    }

    fn execute_in_terminal<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tracing::debug!(command = %command, "executing in terminal");
            let status = self
                .command(command)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| Error::Command(format!("failed to run `{}`: {}", command, e)))?;
            if status.success() {
                Ok(())
            } else {
                Err(Error::Command(format!("`{}` exited with {}", command, status)))
            }
        })
    }
}
