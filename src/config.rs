//! Client configuration.
//!
//! [`ClientConfig`] holds everything that stays fixed across calls: which
//! binary to drive, how failures surface, where scratch files go and where
//! invocations are logged. Defaults can be layered with environment
//! variables through [`ClientConfig::from_env`].

use crate::constants::{
    DEFAULT_EXECUTABLE, DEFAULT_TEMP_PREFIX, ENV_CDO_EXECUTABLE, ENV_DEBUG, eras,
};
use crate::models::ReturnShape;
use crate::version::ToolVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// How recoverable call failures reach the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Return the error
    #[default]
    Strict,
    /// Return [`crate::CallOutput::Failed`] instead
    Lenient,
}

/// Destination of the per-invocation log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    None,
    /// Append to this file
    File(PathBuf),
    /// Keep the log in memory for [`crate::Cdo::collect_logs`]
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path or name of the CDO binary
    pub executable: String,

    pub error_policy: ErrorPolicy,

    /// Re-run operators even when their explicit output file exists
    pub force_output: bool,

    /// Trace every call at info level
    pub debug: bool,

    /// Variables set for every call, overridable per call
    pub env: BTreeMap<String, String>,

    pub temp_dir: PathBuf,

    /// Name prefix tagging scratch files
    pub temp_prefix: String,

    /// Issue scratch names that are never created nor cleaned up
    pub persist_temp_files: bool,

    pub log_target: LogTarget,

    /// Tool version from which "diff"-family operators exit 1 on success
    pub diff_exit_threshold: ToolVersion,

    /// Shape used when a request does not name one
    pub default_return_shape: ReturnShape,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            error_policy: ErrorPolicy::Strict,
            force_output: true,
            debug: false,
            env: BTreeMap::new(),
            temp_dir: std::env::temp_dir(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            persist_temp_files: false,
            log_target: LogTarget::None,
            diff_exit_threshold: ToolVersion::find_in(eras::DIFF_EXIT_THRESHOLD)
                .expect("threshold constant is a version"),
            default_return_shape: ReturnShape::RawPath,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CDO` (executable) and `DEBUG` (any value)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(executable) = std::env::var(ENV_CDO_EXECUTABLE) {
            if !executable.trim().is_empty() {
                debug!("Using executable {} from ${}", executable, ENV_CDO_EXECUTABLE);
                config.executable = executable;
            }
        }
        if std::env::var_os(ENV_DEBUG).is_some() {
            config.debug = true;
        }

        config
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Return failure sentinels instead of errors
    pub fn lenient(self) -> Self {
        self.with_error_policy(ErrorPolicy::Lenient)
    }

    pub fn with_force_output(mut self, force: bool) -> Self {
        self.force_output = force;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn with_persistent_temp_files(mut self) -> Self {
        self.persist_temp_files = true;
        self
    }

    pub fn with_log_target(mut self, target: LogTarget) -> Self {
        self.log_target = target;
        self
    }

    pub fn with_diff_exit_threshold(mut self, threshold: ToolVersion) -> Self {
        self.diff_exit_threshold = threshold;
        self
    }

    pub fn with_default_return_shape(mut self, shape: ReturnShape) -> Self {
        self.default_return_shape = shape;
        self
    }
}
