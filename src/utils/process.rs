//! Subprocess execution with an upper time bound.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{AppError, Result};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Run a command to completion, killing it if it exceeds `timeout`.
///
/// `describe` is what gets logged and reported; it must not contain secrets.
pub async fn run(
    mut command: Command,
    describe: &str,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.kill_on_drop(true);

    log::debug!("Running: {}", describe);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => Ok(CommandOutput::from(output?)),
        Err(_) => Err(AppError::Timeout {
            what: describe.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Like [`run`], but a non-zero exit becomes an error carrying stderr.
pub async fn run_checked(
    command: Command,
    program: &str,
    describe: &str,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let output = run(command, describe, cwd, timeout).await?;
    if output.success {
        Ok(output)
    } else {
        Err(AppError::command(
            program,
            format!("{}: {}", describe, output.stderr.trim()),
        ))
    }
}
