//! Tool version probing and ordering.
//!
//! The CDO binary reports versions such as `1.9.10` or `2.1.1.1`. Only the
//! numeric major.minor.patch prefix takes part in comparisons, and it is
//! compared numerically: `1.6.3 < 1.10.0`.

use crate::constants::{FLAG_VERSION, VERSION_TOKEN_PATTERN};
use crate::error::{CdoError, Result};
use crate::runner::{ProcessRunner, ToolCommand};
use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Version reported by a CDO binary
#[derive(Debug, Clone)]
pub struct ToolVersion {
    numeric: Version,
    raw: String,
}

fn version_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(VERSION_TOKEN_PATTERN).expect("version pattern is valid"))
}

impl ToolVersion {
    /// Extract the first dotted numeric token from `text`
    pub fn find_in(text: &str) -> Option<Self> {
        let token = version_token().find(text)?.as_str();
        let mut parts = token.split('.').map(|p| p.parse::<u64>());

        let mut next = || parts.next().and_then(|p| p.ok()).unwrap_or(0);
        let (major, minor, patch) = (next(), next(), next());

        Some(Self {
            numeric: Version::new(major, minor, patch),
            raw: token.to_string(),
        })
    }

    /// The comparable major.minor.patch triple
    pub fn semver(&self) -> &Version {
        &self.numeric
    }

    /// The token exactly as the tool printed it
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for ToolVersion {
    type Err = CdoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::find_in(s).ok_or_else(|| CdoError::VersionUnparseable {
            executable: String::new(),
            output: s.to_string(),
        })
    }
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.numeric == other.numeric
    }
}

impl Eq for ToolVersion {}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric.cmp(&other.numeric)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl serde::Serialize for ToolVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for ToolVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Run the binary with its version flag and parse the first diagnostic line
pub fn probe(runner: &dyn ProcessRunner, executable: &str) -> Result<ToolVersion> {
    let result = runner.run(&ToolCommand::new(executable).arg(FLAG_VERSION))?;
    let first_line = result.diagnostic_first_line().unwrap_or_default();

    let version = ToolVersion::find_in(first_line).ok_or_else(|| CdoError::VersionUnparseable {
        executable: executable.to_string(),
        output: first_line.to_string(),
    })?;

    debug!("{} reports version {}", executable, version);
    Ok(version)
}
