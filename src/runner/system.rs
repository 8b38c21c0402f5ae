//! Production runner spawning real subprocesses.

use super::{ExecutionResult, ExitStatus, ProcessRunner, ToolCommand};
use crate::error::{CdoError, Result};
use std::process::{Command, Stdio};

/// Blocking runner on top of `std::process`
///
/// There is no timeout: a hung tool blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn convert_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if let Some(code) = status.code() {
            return ExitStatus::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signaled(signal);
            }
        }

        ExitStatus::Signaled(0)
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ExecutionResult> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CdoError::tool_unavailable(&command.program, e.to_string()))?;

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: Self::convert_exit_status(output.status),
        })
    }
}
