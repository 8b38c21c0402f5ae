//! Command implementations for the CDO client CLI
//!
//! Every command binds the tool on a blocking thread, does its work there and
//! hands back the rendered text, which is printed on the async side.

use crate::cli::args::{Args, Commands, OperatorsArgs, OutputFormat, RunArgs};
use crate::client::Cdo;
use crate::config::ClientConfig;
use crate::models::{CallOutput, MaskedArray};
use crate::tempstore::TempFileStore;
use anyhow::{Context, Result};
use colored::*;
use serde_json::json;
use tracing::{debug, info};

/// Write the generated usage text, used when no command is given
pub fn print_usage(out: &mut impl std::io::Write) -> Result<()> {
    use clap::CommandFactory;

    Args::command()
        .write_help(&mut *out)
        .context("Failed to print help")?;
    writeln!(out).context("Failed to print help")?;
    Ok(())
}

/// Execute the parsed command line
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let output = tokio::task::spawn_blocking(move || execute(&args))
        .await
        .context("Worker thread failed")??;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cdo_client={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn execute(args: &Args) -> Result<String> {
    let config = args.client_config();
    let format = args.output_format;

    let Some(command) = &args.command else {
        return Ok(String::new());
    };

    if let Commands::CleanTemp = command {
        return clean_temp(&config);
    }

    let cdo = Cdo::with_config(config.clone())
        .with_context(|| format!("Could not bind CDO binary '{}'", config.executable))?;

    match command {
        Commands::Run(run) => run_operator(&cdo, run, format),
        Commands::Operators(list) => render_operators(&cdo, list, format),
        Commands::Features => render_features(&cdo, format),
        Commands::Version => Ok(render_version(&cdo, format)),
        Commands::OperatorHelp(help) => Ok(cdo.help(&help.operator)?),
        Commands::CleanTemp => clean_temp(&config),
    }
}

fn clean_temp(config: &ClientConfig) -> Result<String> {
    let store = TempFileStore::new(config.temp_dir.clone(), config.temp_prefix.clone());
    let removed = store
        .clean_temp_dir()
        .with_context(|| format!("Could not clean {}", config.temp_dir.display()))?;
    info!("Removed {} scratch files", removed);

    Ok(format!(
        "Removed {} scratch files from {}",
        removed.to_string().green(),
        config.temp_dir.display()
    ))
}

fn run_operator(cdo: &Cdo, run: &RunArgs, format: OutputFormat) -> Result<String> {
    let request = run.to_request();
    let operator = request.operator.clone();

    let output = cdo
        .call(request)
        .with_context(|| format!("Operator '{}' failed", operator))?;

    if let CallOutput::Failed(reason) = &output {
        eprintln!("{} {}", "warning:".yellow().bold(), reason);
    }

    match format {
        OutputFormat::Human => Ok(render_output(&output)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&output_json(&output)?)?),
    }
}

fn render_masked(masked: &MaskedArray) -> String {
    masked
        .values
        .iter()
        .zip(&masked.mask)
        .map(|(value, missing)| if *missing { "_".to_string() } else { value.to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Plain-text rendering of a call result
pub fn render_output(output: &CallOutput) -> String {
    let join = |values: &[f64]| {
        values
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };

    match output {
        CallOutput::Path(path) => path.display().to_string(),
        CallOutput::Paths(paths) => paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        CallOutput::Lines(lines) => lines.join("\n"),
        CallOutput::Fields(fields) => fields.join("\n"),
        CallOutput::Table(rows) => rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
        CallOutput::Array(array) => format!("shape {:?}\n{}", array.shape, join(&array.values)),
        CallOutput::Masked(masked) => {
            format!("shape {:?}\n{}", masked.shape, render_masked(masked))
        }
        CallOutput::Handle(handle) => handle.path().display().to_string(),
        CallOutput::Handles(handles) => handles
            .iter()
            .map(|h| h.path().display().to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        CallOutput::Failed(_) => String::new(),
    }
}

/// JSON rendering of a call result
pub fn output_json(output: &CallOutput) -> Result<serde_json::Value> {
    Ok(match output {
        CallOutput::Path(path) => json!({ "path": path }),
        CallOutput::Paths(paths) => json!({ "paths": paths }),
        CallOutput::Lines(lines) => json!({ "lines": lines }),
        CallOutput::Fields(fields) => json!({ "fields": fields }),
        CallOutput::Table(rows) => json!({ "table": rows }),
        CallOutput::Array(array) => json!({ "shape": array.shape, "values": array.values }),
        CallOutput::Masked(masked) => {
            let values: Vec<Option<f64>> = masked
                .values
                .iter()
                .zip(&masked.mask)
                .map(|(v, missing)| (!missing).then_some(*v))
                .collect();
            json!({ "shape": masked.shape, "values": values })
        }
        CallOutput::Handle(handle) => json!({
            "path": handle.path(),
            "variables": handle.variable_names()?,
        }),
        CallOutput::Handles(handles) => {
            let files = handles
                .iter()
                .map(|h| {
                    Ok(json!({
                        "path": h.path(),
                        "variables": h.variable_names()?,
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            json!({ "files": files })
        }
        CallOutput::Failed(reason) => json!({ "failed": reason }),
    })
}

fn render_operators(cdo: &Cdo, list: &OperatorsArgs, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let operators: Vec<_> = cdo
                .catalog()
                .descriptors()
                .map(|d| {
                    json!({
                        "name": d.name,
                        "inputs": d.input_arity.as_i32(),
                        "outputs": d.output_arity.as_i32(),
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&operators)?)
        }
        OutputFormat::Human if list.arity => Ok(cdo
            .catalog()
            .descriptors()
            .map(|d| {
                format!(
                    "{:<20} {:>3} {:>3}",
                    d.name,
                    d.input_arity.to_string(),
                    d.output_arity.to_string()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Human => Ok(cdo.operators().collect::<Vec<_>>().join("\n")),
    }
}

fn render_features(cdo: &Cdo, format: OutputFormat) -> Result<String> {
    let features = cdo.features();

    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(features)?);
    }

    let mut lines = vec![format!("{}", "Features".bold())];
    for (key, value) in features.features() {
        let mark = if value.is_enabled() {
            "yes".green()
        } else {
            "no".red()
        };
        lines.push(format!("  {:<24} {}", key, mark));
    }

    lines.push(format!("{}", "Libraries".bold()));
    for name in features.libraries().keys() {
        let version = features.lib_version(name).unwrap_or("-");
        lines.push(format!("  {:<24} {}", name, version));
    }

    Ok(lines.join("\n"))
}

fn render_version(cdo: &Cdo, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "executable": cdo.executable(),
            "version": cdo.version(),
            "operators": cdo.catalog().len(),
            "client": env!("CARGO_PKG_VERSION"),
        })
        .to_string(),
        OutputFormat::Human => format!(
            "{} version {} ({} operators)\ncdo_client {}",
            cdo.executable(),
            cdo.version().to_string().bold(),
            cdo.catalog().len(),
            env!("CARGO_PKG_VERSION")
        ),
    }
}
