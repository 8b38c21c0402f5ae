//! Capability discovery for the bound CDO binary.
//!
//! Newer tools dump their build configuration as JSON (`--config all`).
//! Older ones only print a version banner, from which the supported file
//! types are scraped. Library support and versions always come from the
//! banner.

use crate::constants::{CONFIG_ALL, FLAG_CONFIG, FLAG_VERSION, eras};
use crate::error::Result;
use crate::runner::{ProcessRunner, ToolCommand};
use crate::version::ToolVersion;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

/// Value of one capability key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Version(String),
}

impl FeatureValue {
    /// Whether the capability is present
    pub fn is_enabled(&self) -> bool {
        match self {
            FeatureValue::Flag(flag) => *flag,
            FeatureValue::Version(_) => true,
        }
    }
}

/// Capabilities and linked libraries of one executable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolFeatures {
    features: BTreeMap<String, FeatureValue>,
    libraries: BTreeMap<String, FeatureValue>,
}

fn file_types_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:Filetypes|CDI file types):\s*(.*)").expect("file types pattern is valid")
    })
}

fn features_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:with|Features):\s*(.*)").expect("features pattern is valid")
    })
}

fn library_version_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\w+) library version : (\d+\.\S+)").expect("library pattern is valid")
    })
}

impl ToolFeatures {
    /// Probe `executable`, using the JSON dump when `version` supports it
    pub fn probe(
        runner: &dyn ProcessRunner,
        executable: &str,
        version: &ToolVersion,
    ) -> Result<Self> {
        let banner = runner.run(&ToolCommand::new(executable).arg(FLAG_VERSION))?;
        let banner_text: Vec<&str> = banner.diagnostic_lines().collect();
        let banner_text = banner_text.join("\n");

        let config_after: ToolVersion = eras::CONFIG_JSON_AFTER.parse()?;
        let features = if *version > config_after {
            let dump = runner.run(
                &ToolCommand::new(executable)
                    .arg(FLAG_CONFIG)
                    .arg(CONFIG_ALL),
            )?;
            parse_config_json(&dump.stdout)?
        } else {
            parse_file_types(&banner_text)
        };

        let features = Self {
            features,
            libraries: parse_libraries(&banner_text),
        };
        debug!(
            "{} reports {} features and {} libraries",
            executable,
            features.features.len(),
            features.libraries.len()
        );
        Ok(features)
    }

    /// Whether `key` is reported and enabled; unknown keys are absent
    pub fn has_feature(&self, key: &str) -> bool {
        self.features.get(key).is_some_and(FeatureValue::is_enabled)
    }

    pub fn features(&self) -> &BTreeMap<String, FeatureValue> {
        &self.features
    }

    /// Whether the tool was built with library `name` (case-insensitive)
    pub fn has_lib(&self, name: &str) -> bool {
        self.libraries
            .get(&name.to_lowercase())
            .is_some_and(FeatureValue::is_enabled)
    }

    /// Version of library `name`, or `None` when unknown or not linked
    pub fn lib_version(&self, name: &str) -> Option<&str> {
        match self.libraries.get(&name.to_lowercase())? {
            FeatureValue::Version(version) => Some(version),
            FeatureValue::Flag(_) => None,
        }
    }

    pub fn libraries(&self) -> &BTreeMap<String, FeatureValue> {
        &self.libraries
    }
}

/// Decode `--config all` output; `"yes"` means enabled, anything else not
pub fn parse_config_json(text: &str) -> Result<BTreeMap<String, FeatureValue>> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;

    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let enabled = match value {
                serde_json::Value::String(s) => s == "yes",
                serde_json::Value::Bool(b) => b,
                _ => false,
            };
            (key, FeatureValue::Flag(enabled))
        })
        .collect())
}

/// `has-<type>` keys for every file type listed in the banner
pub fn parse_file_types(banner: &str) -> BTreeMap<String, FeatureValue> {
    banner
        .lines()
        .filter_map(|line| file_types_line().captures(line))
        .flat_map(|caps| {
            caps[1]
                .split_whitespace()
                .map(|t| (format!("has-{}", t.to_lowercase()), FeatureValue::Flag(true)))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Linked libraries from the `Features:`/`with:` line and the
/// `<name> library version : <v>` lines
pub fn parse_libraries(banner: &str) -> BTreeMap<String, FeatureValue> {
    let mut libraries = BTreeMap::new();

    for line in banner.lines() {
        if let Some(caps) = features_line().captures(line) {
            for token in caps[1].split_whitespace().flat_map(|t| t.split('/')) {
                if !token.is_empty() {
                    libraries
                        .entry(token.to_lowercase())
                        .or_insert(FeatureValue::Flag(true));
                }
            }
        }
    }

    for caps in banner
        .lines()
        .filter_map(|line| library_version_line().captures(line))
    {
        libraries.insert(
            caps[1].to_lowercase(),
            FeatureValue::Version(caps[2].to_string()),
        );
    }

    libraries
}
