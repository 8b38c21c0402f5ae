//! Success classification and result shaping.
//!
//! After a run the exit code decides success, with the "diff" family
//! allowed to exit 1 on newer tools. Successful runs are then turned into
//! the [`CallOutput`] the caller asked for.

use crate::constants::{DIFF_FAMILY_PREFIX, DIFF_SUCCESS_CODE};
use crate::datafile::DataFileBackend;
use crate::error::{CdoError, Result};
use crate::models::{CallOutput, ReturnShape};
use crate::runner::{ExecutionResult, ToolCommand};
use crate::version::ToolVersion;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a successful run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Produced {
    /// Captured stdout of a zero-output run
    Stdout(String),
    /// Files written at known paths
    Files(Vec<PathBuf>),
    /// Files written under a prefix, discovered afterwards
    Prefix(PathBuf),
}

/// Highest exit code counted as success for `operator`
pub fn expected_success_code(
    operator: &str,
    version: &ToolVersion,
    threshold: &ToolVersion,
) -> i32 {
    if operator.starts_with(DIFF_FAMILY_PREFIX) && version >= threshold {
        DIFF_SUCCESS_CODE
    } else {
        0
    }
}

/// Turn a run into `ExecutionFailed` when its exit code exceeds the
/// expected success code
pub fn classify(
    operator: &str,
    command: &ToolCommand,
    result: &ExecutionResult,
    version: &ToolVersion,
    threshold: &ToolVersion,
) -> Result<()> {
    let expected = expected_success_code(operator, version, threshold);
    let code = result.exit_code();

    if code > expected || code < 0 {
        return Err(CdoError::ExecutionFailed {
            command: command.command_line(),
            exit_code: code,
            stderr: result.stderr.trim_end().to_string(),
        });
    }
    Ok(())
}

/// Stripped stdout lines without the trailing blank line, optionally split
/// into fields
pub fn parse_stdout(stdout: &str, auto_split: Option<&str>) -> CallOutput {
    let mut lines: Vec<String> = stdout.lines().map(|l| l.trim().to_string()).collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    let Some(delimiter) = auto_split else {
        return CallOutput::Lines(lines);
    };

    let split = |line: &str| -> Vec<String> {
        line.split(delimiter)
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    };

    if lines.len() == 1 {
        CallOutput::Fields(split(&lines[0]))
    } else {
        CallOutput::Table(lines.iter().map(|l| split(l)).collect())
    }
}

/// Files created under `prefix`, sorted by name
pub fn discover_split_outputs(prefix: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}*", glob::Pattern::escape(&prefix.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    debug!("Found {} files under prefix {}", files.len(), prefix.display());
    Ok(files)
}

/// Shapes produced results for the caller
pub struct ResultResolver<'a> {
    backend: Option<&'a dyn DataFileBackend>,
}

impl<'a> ResultResolver<'a> {
    pub fn new(backend: Option<&'a dyn DataFileBackend>) -> Self {
        Self { backend }
    }

    fn backend(&self, shape: &ReturnShape) -> Result<&'a dyn DataFileBackend> {
        self.backend.ok_or_else(|| {
            CdoError::unsupported_format(format!(
                "{shape:?} results need a data-file backend; rebuild with the `netcdf` feature"
            ))
        })
    }

    pub fn resolve(
        &self,
        produced: Produced,
        shape: &ReturnShape,
        auto_split: Option<&str>,
    ) -> Result<CallOutput> {
        let (files, from_prefix) = match produced {
            Produced::Stdout(stdout) => return Ok(parse_stdout(&stdout, auto_split)),
            Produced::Files(files) => (files, false),
            Produced::Prefix(prefix) => (discover_split_outputs(&prefix)?, true),
        };

        match shape {
            ReturnShape::Array(variable) => {
                let handle = self.open_first(&files, shape)?;
                Ok(CallOutput::Array(handle.values(variable)?))
            }
            ReturnShape::MaskedArray(variable) => {
                let handle = self.open_first(&files, shape)?;
                Ok(CallOutput::Masked(handle.masked_values(variable)?))
            }
            ReturnShape::Handle => {
                let backend = self.backend(shape)?;
                let mut handles = files
                    .iter()
                    .map(|path| backend.open(path))
                    .collect::<Result<Vec<_>>>()?;
                if handles.len() == 1 && !from_prefix {
                    Ok(CallOutput::Handle(handles.remove(0)))
                } else {
                    Ok(CallOutput::Handles(handles))
                }
            }
            ReturnShape::RawPath | ReturnShape::ParsedLines => {
                let mut files = files;
                if files.len() == 1 && !from_prefix {
                    Ok(CallOutput::Path(files.remove(0)))
                } else {
                    Ok(CallOutput::Paths(files))
                }
            }
        }
    }

    fn open_first(
        &self,
        files: &[PathBuf],
        shape: &ReturnShape,
    ) -> Result<Box<dyn crate::datafile::DataHandle>> {
        let backend = self.backend(shape)?;
        let first = files
            .first()
            .ok_or_else(|| CdoError::unsupported_format("operator produced no output files"))?;
        backend.open(first)
    }
}
