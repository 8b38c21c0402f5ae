//! Error handling for CDO client operations.
//!
//! Discovery errors (`ToolUnavailable`, `VersionUnparseable`,
//! `OperatorsUnavailable`) abort client construction. Per-call errors are
//! either raised or folded into a sentinel value depending on the client's
//! [`ErrorPolicy`](crate::config::ErrorPolicy).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdoError {
    #[error("CDO binary '{executable}' is not available: {reason}")]
    ToolUnavailable { executable: String, reason: String },

    #[error("Could not parse a version from '{executable}' output: {output:?}")]
    VersionUnparseable { executable: String, output: String },

    #[error("Operators could not be listed by '{executable}': got {lines} usable lines of output")]
    OperatorsUnavailable { executable: String, lines: usize },

    #[error("Unknown operator: {name}")]
    UnknownOperator { name: String },

    #[error("CDO did not run successfully (exit code {exit_code}): {command}\n{stderr}")]
    ExecutionFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Variable '{variable}' not found in {path}")]
    VariableNotFound { path: PathBuf, variable: String },

    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("Invalid request for operator '{operator}': {reason}")]
    InvalidRequest { operator: String, reason: String },

    #[error("Data file error for {path}: {reason}")]
    DataFile { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Could not decode tool configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl CdoError {
    pub fn tool_unavailable(executable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            executable: executable.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_operator(name: impl Into<String>) -> Self {
        Self::UnknownOperator { name: name.into() }
    }

    pub fn invalid_request(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_format(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    pub fn data_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error may be folded into a sentinel under a lenient policy
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CdoError::UnknownOperator { .. } | CdoError::ExecutionFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CdoError>;
