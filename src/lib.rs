//! CDO Client Library
//!
//! A Rust client for the Climate Data Operators (CDO) command-line tool.
//! Operators are not hard-coded: the client asks the bound binary which
//! operators it offers and how many files each one writes, then runs them by
//! name.
//!
//! This library provides tools for:
//! - Probing the tool version and choosing the matching discovery strategy
//! - Building invocations from operator names, parameters, nested input
//!   expressions and raw tool options
//! - Allocating and cleaning up scratch output files
//! - Classifying exit codes, including the diff family's "differences found" code
//! - Returning file paths, parsed text lines or variable values
//! - Reporting the file types and libraries compiled into the tool

pub mod catalog;
pub mod client;
pub mod command;
pub mod config;
pub mod constants;
pub mod datafile;
pub mod error;
pub mod features;
pub mod levels;
pub mod logsink;
pub mod models;
pub mod resolver;
pub mod runner;
pub mod tempstore;
pub mod version;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use catalog::{DiscoveryStrategy, OperatorCatalog};
pub use client::{Cdo, has_executable};
pub use config::{ClientConfig, ErrorPolicy, LogTarget};
pub use datafile::{DataFileBackend, DataHandle, MemoryBackend, MemoryFile};
pub use error::{CdoError, Result};
pub use features::{FeatureValue, ToolFeatures};
pub use models::{
    ArrayData, Arity, CallOutput, InvocationRequest, MaskedArray, OperatorDescriptor, Output,
    Param, ReturnShape,
};
pub use runner::{
    ExecutionResult, ExitStatus, MockRunner, ProcessRunner, SystemRunner, ToolCommand,
};
pub use tempstore::TempFileStore;
pub use version::ToolVersion;
