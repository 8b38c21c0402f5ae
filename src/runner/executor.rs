//! Environment layering and call tracing around a [`ProcessRunner`].

use super::{ExecutionResult, ProcessRunner, ToolCommand};
use crate::error::Result;
use crate::logsink::LogSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs tool commands with the client environment and logging applied
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn ProcessRunner>,
    base_env: BTreeMap<String, String>,
    debug: bool,
    sink: Option<LogSink>,
}

impl Executor {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            base_env: BTreeMap::new(),
            debug: false,
            sink: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.base_env = env;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_sink(mut self, sink: Option<LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn sink(&self) -> Option<&LogSink> {
        self.sink.as_ref()
    }

    /// Run `command` with the base environment, then `overrides`, layered
    /// over the inherited one
    pub fn run(
        &self,
        command: ToolCommand,
        overrides: &BTreeMap<String, String>,
    ) -> Result<ExecutionResult> {
        let command = command.envs(&self.base_env).envs(overrides);

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.info(&command.command_line()) {
                warn!("Could not write invocation log: {}", e);
            }
        }

        let result = self.runner.run(&command)?;
        self.trace(&command, &result);
        Ok(result)
    }

    fn trace(&self, command: &ToolCommand, result: &ExecutionResult) {
        let block = format!(
            "# ENV: {:?}\n# CALL: {}\n# STDOUT:\n{}\n# STDERR:\n{}\n# EXIT: {}",
            command.env,
            command.command_line(),
            result.stdout.trim_end(),
            result.stderr.trim_end(),
            result.exit_code()
        );

        if self.debug {
            info!("{}", block);
        } else {
            debug!("{}", block);
        }
    }

    /// Append the failure diagnostics of a classified failure to the log
    pub fn log_failure(&self, result: &ExecutionResult) {
        if let Some(sink) = &self.sink {
            let text = if result.stderr.trim().is_empty() {
                &result.stdout
            } else {
                &result.stderr
            };
            if let Err(e) = sink.error(text) {
                warn!("Could not write invocation log: {}", e);
            }
        }
    }
}
