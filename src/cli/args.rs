//! Command-line argument definitions for the CDO client
//!
//! This module defines the CLI interface using the clap derive API.

use crate::config::{ClientConfig, ErrorPolicy};
use crate::models::{InvocationRequest, Output, ReturnShape};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the CDO client
///
/// Discovers the operators of an installed CDO binary and runs them by name.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cdo_client",
    version,
    disable_help_subcommand = true,
    about = "Run Climate Data Operators by name with runtime operator discovery",
    long_about = "Binds an installed CDO binary, discovers which operators it offers and \
                  how many files each one writes, then runs operators by name. Results come \
                  back as file paths, parsed text lines, or variable values read from the \
                  produced netCDF file."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the CDO binary
    ///
    /// Defaults to the `CDO` environment variable, then `cdo` on the PATH.
    #[arg(long = "cdo", value_name = "PATH", global = true)]
    pub executable: Option<String>,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress output except errors"
    )]
    pub quiet: bool,

    /// Trace every tool invocation (command, environment, streams, exit code)
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Report failed operator runs as a warning instead of an error
    #[arg(long = "lenient", global = true)]
    pub lenient: bool,

    /// Output format for results
    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        global = true
    )]
    pub output_format: OutputFormat,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run one operator
    Run(RunArgs),
    /// List the operators offered by the binary
    Operators(OperatorsArgs),
    /// Show file types and libraries supported by the binary
    Features,
    /// Show the version of the bound binary
    Version,
    /// Show the tool's documentation for an operator
    #[command(name = "help")]
    OperatorHelp(OperatorHelpArgs),
    /// Remove this user's leftover scratch files
    CleanTemp,
}

/// Arguments for the run command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    /// Operator name, without the leading dash
    pub operator: String,

    /// Positional operator parameters, joined with commas
    #[arg(allow_negative_numbers = true)]
    pub params: Vec<String>,

    /// Input file or nested operator expression (repeatable)
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        allow_hyphen_values = true
    )]
    pub inputs: Vec<String>,

    /// Output file, or file-name prefix for split operators (repeatable)
    ///
    /// Scratch files are allocated when omitted.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub outputs: Vec<PathBuf>,

    /// Raw tool options such as "-f nc4 -b F32"
    #[arg(long = "options", value_name = "OPTIONS", allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Print the values of this variable from the result
    #[arg(long = "array", value_name = "VAR", conflicts_with = "masked")]
    pub array: Option<String>,

    /// Print the values of this variable with missing values masked
    #[arg(long = "masked", value_name = "VAR")]
    pub masked: Option<String>,

    /// Split each printed line into fields at this delimiter
    #[arg(long = "split", value_name = "DELIM")]
    pub split: Option<String>,

    /// Capture stdout instead of writing a file
    #[arg(long = "stdout")]
    pub stdout: bool,

    /// Keep an existing output file instead of re-running the operator
    #[arg(long = "no-force")]
    pub no_force: bool,

    /// Environment variable for this call (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

/// Arguments for the operators command
#[derive(Debug, Clone, Parser)]
pub struct OperatorsArgs {
    /// Show input and output counts (-1 = variable)
    #[arg(long = "arity")]
    pub arity: bool,
}

/// Arguments for the help command
#[derive(Debug, Clone, Parser)]
pub struct OperatorHelpArgs {
    /// Operator name
    pub operator: String,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

/// Parse a `KEY=VALUE` pair
pub fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Args {
    /// Log level from verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Environment-derived configuration with command-line overrides applied
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();

        if let Some(executable) = &self.executable {
            config.executable = executable.clone();
        }
        if self.debug {
            config.debug = true;
        }
        if self.lenient {
            config.error_policy = ErrorPolicy::Lenient;
        }

        config
    }
}

impl RunArgs {
    /// The invocation described by these arguments
    pub fn to_request(&self) -> InvocationRequest {
        let mut request = InvocationRequest::new(&self.operator)
            .params(self.params.iter().map(String::as_str))
            .inputs(self.inputs.iter().cloned());

        request.output = match self.outputs.as_slice() {
            _ if self.stdout => Output::Stdout,
            [] => Output::Temp,
            [single] => Output::Path(single.clone()),
            many => Output::Paths(many.to_vec()),
        };

        if let Some(options) = &self.options {
            request = request.options(options);
        }
        if let Some(variable) = &self.array {
            request = request.return_shape(ReturnShape::Array(variable.clone()));
        }
        if let Some(variable) = &self.masked {
            request = request.return_shape(ReturnShape::MaskedArray(variable.clone()));
        }
        if let Some(delimiter) = &self.split {
            request = request.auto_split(delimiter);
        }
        if self.no_force {
            request = request.force(false);
        }
        for (key, value) in &self.env {
            request = request.env(key, value);
        }

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_run_arguments() {
        let args = parse(&[
            "cdo_client",
            "run",
            "intlevel",
            "0",
            "10",
            "-i",
            "-stdatm,0,10,100",
            "-o",
            "out.nc",
            "--options",
            "-f nc",
            "--env",
            "CDO_FILE_SUFFIX=.nc",
            "--no-force",
        ]);

        let Some(Commands::Run(run)) = args.command else {
            panic!("Expected run command");
        };
        let request = run.to_request();

        assert_eq!(request.operator, "intlevel");
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.input, vec!["-stdatm,0,10,100"]);
        assert_eq!(request.output, Output::Path(PathBuf::from("out.nc")));
        assert_eq!(request.options.as_deref(), Some("-f nc"));
        assert_eq!(request.env["CDO_FILE_SUFFIX"], ".nc");
        assert_eq!(request.force, Some(false));
    }

    #[test]
    fn test_output_variants() {
        let args = parse(&[
            "cdo_client", "run", "eof", "4", "-i", "in.nc", "-o", "a.nc", "-o", "b.nc",
        ]);
        let Some(Commands::Run(run)) = args.command else {
            panic!("Expected run command");
        };
        assert!(matches!(run.to_request().output, Output::Paths(ref p) if p.len() == 2));

        let args = parse(&["cdo_client", "run", "sinfo", "-i", "in.nc", "--stdout"]);
        let Some(Commands::Run(run)) = args.command else {
            panic!("Expected run command");
        };
        assert_eq!(run.to_request().output, Output::Stdout);
    }

    #[test]
    fn test_array_and_masked_conflict() {
        let result = Args::try_parse_from([
            "cdo_client", "run", "stdatm", "0", "--array", "T", "--masked", "T",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_and_help_command() {
        let args = parse(&["cdo_client", "help", "sinfo", "--cdo", "/opt/cdo", "--lenient", "-vv"]);

        assert!(matches!(
            args.command,
            Some(Commands::OperatorHelp(ref h)) if h.operator == "sinfo"
        ));
        assert_eq!(args.get_log_level(), "debug");

        let config = args.client_config();
        assert_eq!(config.executable, "/opt/cdo");
        assert_eq!(config.error_policy, ErrorPolicy::Lenient);
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_env_pair("novalue").is_err());
        assert!(parse_env_pair("=x").is_err());
    }
}
