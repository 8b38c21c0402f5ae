//! Operator discovery strategies
//!
//! The way a CDO binary lists its operators changed several times. Each
//! release range maps to exactly one [`DiscoveryStrategy`]; releases that
//! cannot report arities get them from the static [`EraTable`]s.

use crate::constants::arity_tables::{NO_OUTPUT, TWO_OUTPUT, UNDOCUMENTED, VARIABLE_OUTPUT};
use crate::constants::{
    FLAG_HELP, FLAG_OPERATORS, FLAG_OPERATORS_NO_OUTPUT, MIN_HELP_LINES, OPERATORS_HEADER,
    VERSION_BANNER_PATTERN, eras,
};
use crate::error::{CdoError, Result};
use crate::models::{Arity, OperatorDescriptor};
use crate::runner::{ProcessRunner, ToolCommand};
use crate::version::ToolVersion;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Arity corrections applied to names gathered from releases that do not
/// report arities
#[derive(Debug, PartialEq, Eq)]
pub struct EraTable {
    /// Zero-output operators, unless the tool lists them itself
    pub no_output: &'static [&'static str],
    pub two_output: &'static [&'static str],
    pub variable_output: &'static [&'static str],
    /// Names the listing omits but the tool accepts
    pub undocumented: &'static [&'static str],
}

/// Releases before 1.5.6
pub static SINGLE_LINE_HELP_ERA: EraTable = EraTable {
    no_output: NO_OUTPUT,
    two_output: TWO_OUTPUT,
    variable_output: VARIABLE_OUTPUT,
    undocumented: UNDOCUMENTED,
};

/// Releases up to 1.8.0 and the 1.9.0 release
pub static STATIC_TABLE_ERA: EraTable = EraTable {
    no_output: NO_OUTPUT,
    two_output: TWO_OUTPUT,
    variable_output: VARIABLE_OUTPUT,
    undocumented: &[],
};

/// Releases from 1.8.0 to 1.9.2, except 1.9.0
pub static NO_OUTPUT_FLAG_ERA: EraTable = EraTable {
    no_output: &[],
    two_output: TWO_OUTPUT,
    variable_output: VARIABLE_OUTPUT,
    undocumented: &[],
};

/// How operators are enumerated for a given tool release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// Parse the free-text help after the `Operators:` header
    HelpText {
        single_line: bool,
        table: &'static EraTable,
    },
    /// One operator per `--operators` line, arities from tables
    OperatorList {
        no_output_flag: bool,
        table: &'static EraTable,
    },
    /// `--operators` lines ending in `(inputs|outputs)`
    ArityListing,
}

fn era(version: &str) -> ToolVersion {
    ToolVersion::find_in(version).expect("era constants are versions")
}

impl DiscoveryStrategy {
    /// Select the strategy for `version`; every version maps to exactly one
    pub fn for_version(version: &ToolVersion) -> Self {
        if *version < era(eras::OPERATORS_FLAG_FROM) {
            let single_line = *version < era(eras::SINGLE_LINE_HELP_BEFORE);
            DiscoveryStrategy::HelpText {
                single_line,
                table: if single_line {
                    &SINGLE_LINE_HELP_ERA
                } else {
                    &STATIC_TABLE_ERA
                },
            }
        } else if *version < era(eras::NO_OUTPUT_FLAG_FROM)
            || *version == era(eras::NO_OUTPUT_FLAG_BROKEN)
        {
            DiscoveryStrategy::OperatorList {
                no_output_flag: false,
                table: &STATIC_TABLE_ERA,
            }
        } else if *version < era(eras::ARITY_SUFFIX_FROM) {
            DiscoveryStrategy::OperatorList {
                no_output_flag: true,
                table: &NO_OUTPUT_FLAG_ERA,
            }
        } else {
            DiscoveryStrategy::ArityListing
        }
    }

    /// Run the strategy against the tool
    pub fn discover(
        &self,
        runner: &dyn ProcessRunner,
        executable: &str,
    ) -> Result<BTreeMap<String, OperatorDescriptor>> {
        debug!("Discovering operators of {} via {:?}", executable, self);

        match self {
            DiscoveryStrategy::HelpText { single_line, table } => {
                let result = runner.run(&ToolCommand::new(executable).arg(FLAG_HELP))?;
                let lines: Vec<&str> = result.diagnostic_lines().collect();
                check_line_count(executable, &lines)?;

                let mut names = parse_help_text(&lines, *single_line).ok_or_else(|| {
                    CdoError::OperatorsUnavailable {
                        executable: executable.to_string(),
                        lines: lines.len(),
                    }
                })?;
                names.extend(table.undocumented.iter().map(|n| n.to_string()));

                Ok(apply_era_table(names, table, &[]))
            }
            DiscoveryStrategy::OperatorList {
                no_output_flag,
                table,
            } => {
                let listing = list_operators(runner, executable)?;
                let names = listing.iter().filter_map(|l| first_token(l)).collect();

                let no_output = if *no_output_flag {
                    let result =
                        runner.run(&ToolCommand::new(executable).arg(FLAG_OPERATORS_NO_OUTPUT))?;
                    result
                        .stdout
                        .split_whitespace()
                        .map(str::to_string)
                        .collect()
                } else {
                    Vec::new()
                };

                Ok(apply_era_table(names, table, &no_output))
            }
            DiscoveryStrategy::ArityListing => {
                let listing = list_operators(runner, executable)?;
                let operators = parse_arity_listing(&listing);
                if operators.len() <= MIN_HELP_LINES {
                    warn!(
                        "Only {} of {} listed operators of {} carry an arity suffix",
                        operators.len(),
                        listing.len(),
                        executable
                    );
                    return Err(CdoError::OperatorsUnavailable {
                        executable: executable.to_string(),
                        lines: operators.len(),
                    });
                }
                Ok(operators)
            }
        }
    }
}

fn list_operators(runner: &dyn ProcessRunner, executable: &str) -> Result<Vec<String>> {
    let result = runner.run(&ToolCommand::new(executable).arg(FLAG_OPERATORS))?;
    let lines: Vec<String> = result
        .stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    check_line_count(executable, &lines)?;
    Ok(lines)
}

fn check_line_count<S: AsRef<str>>(executable: &str, lines: &[S]) -> Result<()> {
    if lines.len() <= MIN_HELP_LINES {
        let text: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        warn!(
            "Operator listing of {} has only {} lines:\n{}",
            executable,
            lines.len(),
            text.join("\n")
        );
        return Err(CdoError::OperatorsUnavailable {
            executable: executable.to_string(),
            lines: lines.len(),
        });
    }
    Ok(())
}

fn first_token(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}

fn banner_pattern() -> &'static Regex {
    static BANNER: OnceLock<Regex> = OnceLock::new();
    BANNER.get_or_init(|| Regex::new(VERSION_BANNER_PATTERN).expect("banner pattern is valid"))
}

fn arity_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| {
        Regex::new(r"\((-?\d+)\|(-?\d+)\)\s*$").expect("arity suffix pattern is valid")
    })
}

/// Operator names listed after the `Operators:` header
///
/// Single-line help keeps everything on the line following the header;
/// later help text runs until the version banner (or the first blank line
/// when no banner follows).
pub fn parse_help_text<S: AsRef<str>>(lines: &[S], single_line: bool) -> Option<Vec<String>> {
    let header = lines
        .iter()
        .position(|l| l.as_ref().trim() == OPERATORS_HEADER)?;
    let body = &lines[header + 1..];

    if single_line {
        let line = body.first()?;
        return Some(line.as_ref().split_whitespace().map(str::to_string).collect());
    }

    let has_banner = body.iter().any(|l| banner_pattern().is_match(l.as_ref()));
    let names = body
        .iter()
        .map(AsRef::as_ref)
        .take_while(|l| {
            if has_banner {
                !banner_pattern().is_match(l)
            } else {
                !l.trim().is_empty()
            }
        })
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect();

    Some(names)
}

/// Build descriptors from bare names, correcting arities from `table`
///
/// `listed_no_output` holds zero-output names reported by the tool itself.
pub fn apply_era_table(
    names: Vec<String>,
    table: &EraTable,
    listed_no_output: &[String],
) -> BTreeMap<String, OperatorDescriptor> {
    names
        .into_iter()
        .map(|name| {
            let output_arity = if table.variable_output.contains(&name.as_str()) {
                Arity::Variable
            } else if table.two_output.contains(&name.as_str()) {
                Arity::Fixed(2)
            } else if table.no_output.contains(&name.as_str()) || listed_no_output.contains(&name)
            {
                Arity::Fixed(0)
            } else {
                Arity::Fixed(1)
            };
            let descriptor = OperatorDescriptor::new(name.clone(), Arity::Fixed(1), output_arity);
            (name, descriptor)
        })
        .collect()
}

/// Parse `name  description  (inputs|outputs)` lines
///
/// Lines without the arity suffix are skipped with a warning.
pub fn parse_arity_listing<S: AsRef<str>>(lines: &[S]) -> BTreeMap<String, OperatorDescriptor> {
    let mut operators = BTreeMap::new();

    for line in lines.iter().map(AsRef::as_ref) {
        let parsed = arity_suffix().captures(line).and_then(|caps| {
            let name = first_token(line)?;
            let inputs = caps[1].parse::<i64>().ok()?;
            let outputs = caps[2].parse::<i64>().ok()?;
            Some(OperatorDescriptor::new(
                name,
                Arity::from_input_count(inputs),
                Arity::from_output_count(outputs),
            ))
        });

        match parsed {
            Some(descriptor) => {
                operators.insert(descriptor.name.clone(), descriptor);
            }
            None => warn!("Skipping unparseable operator line: {}", line.trim()),
        }
    }

    operators
}
