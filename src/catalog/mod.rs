//! Catalog of the operators offered by the bound CDO binary.
//!
//! Built once per executable from the tool's own listing, using the
//! discovery strategy that matches the tool's version.

pub mod discovery;


pub use self::discovery::DiscoveryStrategy;

use crate::error::Result;
use crate::models::OperatorDescriptor;
use crate::runner::ProcessRunner;
use crate::version::ToolVersion;
use std::collections::BTreeMap;
use tracing::info;

/// Operator name to descriptor lookup for one executable
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    executable: String,
    version: ToolVersion,
    strategy: DiscoveryStrategy,
    operators: BTreeMap<String, OperatorDescriptor>,
}

impl OperatorCatalog {
    /// Discover the operators of `executable`, which reported `version`
    pub fn build(
        runner: &dyn ProcessRunner,
        executable: &str,
        version: &ToolVersion,
    ) -> Result<Self> {
        let strategy = DiscoveryStrategy::for_version(version);
        let operators = strategy.discover(runner, executable)?;

        info!(
            "Found {} operators in {} (version {})",
            operators.len(),
            executable,
            version
        );

        Ok(Self {
            executable: executable.to_string(),
            version: version.clone(),
            strategy,
            operators,
        })
    }

    /// Catalog over a fixed set of descriptors
    pub fn from_descriptors<I>(executable: &str, version: ToolVersion, descriptors: I) -> Self
    where
        I: IntoIterator<Item = OperatorDescriptor>,
    {
        Self {
            executable: executable.to_string(),
            strategy: DiscoveryStrategy::for_version(&version),
            version,
            operators: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Operator names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.operators.values()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn version(&self) -> &ToolVersion {
        &self.version
    }

    pub fn strategy(&self) -> DiscoveryStrategy {
        self.strategy
    }
}
