//! Subprocess execution seam.
//!
//! Everything that talks to the CDO binary goes through [`ProcessRunner`], so
//! discovery and dispatch can be driven by [`MockRunner`] in tests and by
//! [`SystemRunner`] in production.

pub mod executor;
pub mod mock;
pub mod system;

pub use executor::Executor;
pub use mock::{MockExpectation, MockRunner};
pub use system::SystemRunner;

use crate::constants::SIGNAL_EXIT_BASE;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;

/// A fully formed invocation of the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Merge variables into the command environment, later values winning
    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// The command as a single shell-quoted line
    pub fn command_line(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// How the subprocess terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    /// Exit code, with signal terminations mapped above the 0..=255 range
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signal) => SIGNAL_EXIT_BASE + signal,
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, ExitStatus::Signaled(_))
    }
}

/// Captured outcome of one subprocess run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl ExecutionResult {
    pub fn exit_code(&self) -> i32 {
        self.status.code()
    }

    /// First non-empty line of stderr, falling back to stdout
    pub fn diagnostic_first_line(&self) -> Option<&str> {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    /// All lines of stderr followed by stdout
    pub fn diagnostic_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr.lines().chain(self.stdout.lines())
    }
}

/// Runs tool commands to completion, capturing both streams
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ExecutionResult>;
}
