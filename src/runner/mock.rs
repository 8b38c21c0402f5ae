//! Scripted runner for exercising discovery and dispatch without a CDO binary.

use super::{ExecutionResult, ExitStatus, ProcessRunner, ToolCommand};
use crate::error::{CdoError, Result};
use std::sync::{Arc, Mutex, MutexGuard};

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;
type Effect = Box<dyn Fn(&ToolCommand) + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockRunner {
    expectations: Arc<Mutex<Vec<Expectation>>>,
    call_history: Arc<Mutex<Vec<ToolCommand>>>,
}

struct Expectation {
    matcher: ArgsMatcher,
    response: ExecutionResult,
    effect: Option<Effect>,
}

/// Builder for one scripted response, registered by [`MockExpectation::finish`]
pub struct MockExpectation {
    runner: MockRunner,
    expectation: Expectation,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for calls whose arguments satisfy `matcher`
    ///
    /// Expectations are tried in registration order; the first match wins.
    pub fn expect<F>(&self, matcher: F) -> MockExpectation
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        MockExpectation {
            runner: self.clone(),
            expectation: Expectation {
                matcher: Box::new(matcher),
                response: ExecutionResult {
                    stdout: String::new(),
                    stderr: String::new(),
                    status: ExitStatus::Exited(0),
                },
                effect: None,
            },
        }
    }

    /// Script a response for calls whose arguments equal `args` exactly
    pub fn expect_args(&self, args: &[&str]) -> MockExpectation {
        let expected: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.expect(move |actual| actual == expected.as_slice())
    }

    /// Script a response for calls containing `arg` anywhere
    pub fn expect_containing(&self, arg: &str) -> MockExpectation {
        let needle = arg.to_string();
        self.expect(move |actual| actual.iter().any(|a| *a == needle))
    }

    /// Script a response for calls of `operator`, with or without parameters
    pub fn expect_operator(&self, operator: &str) -> MockExpectation {
        let bare = format!("-{operator}");
        let with_params = format!("-{operator},");
        self.expect(move |actual| {
            actual
                .iter()
                .any(|a| *a == bare || a.starts_with(&with_params))
        })
    }

    pub fn call_history(&self) -> Vec<ToolCommand> {
        lock(&self.call_history).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_history).len()
    }

    /// Number of recorded calls containing `arg`
    pub fn calls_containing(&self, arg: &str) -> usize {
        lock(&self.call_history)
            .iter()
            .filter(|cmd| cmd.args.iter().any(|a| a == arg))
            .count()
    }

    pub fn clear_history(&self) {
        lock(&self.call_history).clear();
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, command: &ToolCommand) -> Result<ExecutionResult> {
        lock(&self.call_history).push(command.clone());

        let expectations = lock(&self.expectations);
        let expectation = expectations
            .iter()
            .find(|e| (e.matcher)(&command.args))
            .ok_or_else(|| {
                CdoError::tool_unavailable(
                    &command.program,
                    format!("no mock expectation for {:?}", command.args),
                )
            })?;

        if let Some(effect) = &expectation.effect {
            effect(command);
        }

        Ok(expectation.response.clone())
    }
}

impl MockExpectation {
    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = ExitStatus::Exited(code);
        self
    }

    pub fn returns_signal(mut self, signal: i32) -> Self {
        self.expectation.response.status = ExitStatus::Signaled(signal);
        self
    }

    /// Run `effect` on every matching call, e.g. to create output files
    pub fn with_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(&ToolCommand) + Send + Sync + 'static,
    {
        self.expectation.effect = Some(Box::new(effect));
        self
    }

    /// Write a small file at the command's last argument, like a real operator
    pub fn writes_last_arg(self) -> Self {
        self.with_effect(|command| {
            if let Some(path) = command.args.last() {
                let _ = std::fs::write(path, b"CDF\x01");
            }
        })
    }

    pub fn finish(self) {
        lock(&self.runner.expectations).push(self.expectation);
    }
}
