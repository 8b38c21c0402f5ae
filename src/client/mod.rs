//! The `Cdo` client: operator calls dispatched by name.
//!
//! Construction binds one executable, probes its version, builds its
//! operator catalog and reads its features. A failure there is fatal.
//! Afterwards every [`Cdo::call`] validates the operator against the
//! catalog, builds the command line, runs it once and shapes the result.
//!
//! ```no_run
//! use cdo_client::{Cdo, InvocationRequest};
//!
//! let cdo = Cdo::new()?;
//! let levels = cdo
//!     .call(InvocationRequest::new("showlevel").input("-stdatm,0,10,100"))?
//!     .into_lines();
//! # Ok::<(), cdo_client::CdoError>(())
//! ```

#[cfg(test)]
pub mod tests;

use crate::catalog::OperatorCatalog;
use crate::command;
use crate::config::{ClientConfig, ErrorPolicy};
use crate::constants::{FLAG_HELP, SPLIT_FAMILY_PREFIX};
use crate::datafile::{DataFileBackend, default_backend};
use crate::error::{CdoError, Result};
use crate::features::ToolFeatures;
use crate::logsink::LogSink;
use crate::models::{
    Arity, CallOutput, InvocationRequest, OperatorDescriptor, Output, Param, ReturnShape,
};
use crate::resolver::{self, Produced, ResultResolver};
use crate::runner::{ExecutionResult, Executor, ProcessRunner, SystemRunner, ToolCommand};
use crate::tempstore::TempFileStore;
use crate::version::{self, ToolVersion};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outputs decided before a file-producing run
enum OutputPlan {
    /// Explicit outputs exist and forcing is off
    Reuse(Vec<PathBuf>),
    Write {
        targets: Vec<PathBuf>,
        produced: Produced,
    },
}

/// Everything learned about one executable during discovery
struct Discovery {
    version: ToolVersion,
    catalog: OperatorCatalog,
    features: ToolFeatures,
}

impl Discovery {
    fn run(runner: &dyn ProcessRunner, executable: &str) -> Result<Self> {
        let version = version::probe(runner, executable)?;
        let catalog = OperatorCatalog::build(runner, executable, &version)?;
        let features = ToolFeatures::probe(runner, executable, &version)?;
        Ok(Self {
            version,
            catalog,
            features,
        })
    }
}

/// Client bound to one CDO executable
pub struct Cdo {
    config: ClientConfig,
    runner: Arc<dyn ProcessRunner>,
    executor: Executor,
    version: ToolVersion,
    catalog: OperatorCatalog,
    features: ToolFeatures,
    temp: TempFileStore,
    backend: Option<Arc<dyn DataFileBackend>>,
}

impl Cdo {
    /// Client configured from the environment, running the real binary
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::from_env())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Client whose subprocesses all go through `runner`
    pub fn with_runner(config: ClientConfig, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let discovery = Discovery::run(runner.as_ref(), &config.executable)?;

        let temp = TempFileStore::new(&config.temp_dir, &config.temp_prefix);
        temp.set_persist(config.persist_temp_files);

        let executor = Executor::new(runner.clone())
            .with_env(config.env.clone())
            .with_debug(config.debug)
            .with_sink(LogSink::from_target(&config.log_target));

        info!(
            "Bound {} (version {}, {} operators)",
            config.executable,
            discovery.version,
            discovery.catalog.len()
        );

        Ok(Self {
            config,
            runner,
            executor,
            version: discovery.version,
            catalog: discovery.catalog,
            features: discovery.features,
            temp,
            backend: default_backend(),
        })
    }

    /// Replace the data-file backend used for array and handle results
    pub fn with_backend(mut self, backend: Arc<dyn DataFileBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn without_backend(mut self) -> Self {
        self.backend = None;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn executable(&self) -> &str {
        &self.config.executable
    }

    pub fn version(&self) -> &ToolVersion {
        &self.version
    }

    pub fn catalog(&self) -> &OperatorCatalog {
        &self.catalog
    }

    /// Operator names in sorted order
    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.catalog.names()
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.catalog.get(name)
    }

    pub fn features(&self) -> &ToolFeatures {
        &self.features
    }

    pub fn has_feature(&self, key: &str) -> bool {
        self.features.has_feature(key)
    }

    pub fn has_lib(&self, name: &str) -> bool {
        self.features.has_lib(name)
    }

    pub fn lib_version(&self, name: &str) -> Option<&str> {
        self.features.lib_version(name)
    }

    pub fn temp_store(&self) -> &TempFileStore {
        &self.temp
    }

    /// Bind another executable, re-running discovery
    ///
    /// On failure the client stays bound to the previous executable.
    pub fn set_executable(&mut self, executable: impl Into<String>) -> Result<()> {
        let executable = executable.into();
        let discovery = Discovery::run(self.runner.as_ref(), &executable)?;

        self.config.executable = executable;
        self.version = discovery.version;
        self.catalog = discovery.catalog;
        self.features = discovery.features;
        Ok(())
    }

    /// Rebuild the operator catalog of the current executable
    pub fn rebuild_catalog(&mut self) -> Result<()> {
        self.catalog =
            OperatorCatalog::build(self.runner.as_ref(), self.executable(), &self.version)?;
        Ok(())
    }

    pub fn set_error_policy(&mut self, policy: ErrorPolicy) {
        self.config.error_policy = policy;
    }

    pub fn set_force_output(&mut self, force: bool) {
        self.config.force_output = force;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.executor = self.executor.clone().with_debug(debug);
    }

    /// Switch scratch naming for subsequent allocations
    pub fn set_persist(&self, persist: bool) {
        self.temp.set_persist(persist);
    }

    /// Remove the scratch files created so far; returns how many
    pub fn cleanup(&self) -> usize {
        self.temp.cleanup()
    }

    /// Remove this user's tagged files from the scratch directory
    pub fn clean_temp_dir(&self) -> Result<usize> {
        self.temp.clean_temp_dir()
    }

    /// Text written to the invocation log so far
    pub fn collect_logs(&self) -> Result<String> {
        match self.executor.sink() {
            Some(sink) => sink.collect(),
            None => Ok(String::new()),
        }
    }

    /// The tool's help text for `operator`
    pub fn help(&self, operator: &str) -> Result<String> {
        if !self.catalog.contains(operator) {
            return Err(CdoError::unknown_operator(operator));
        }

        let command = ToolCommand::new(self.executable()).arg(FLAG_HELP).arg(operator);
        let result = self.executor.run(command, &BTreeMap::new())?;

        Ok(if result.stdout.trim().is_empty() {
            result.stderr
        } else {
            result.stdout
        })
    }

    /// Operator expression for use as another call's input
    pub fn expr<S: AsRef<str>>(
        &self,
        operator: &str,
        params: &[Param],
        inputs: &[S],
    ) -> Result<String> {
        if !self.catalog.contains(operator) {
            return Err(CdoError::unknown_operator(operator));
        }
        Ok(command::operator_expr(operator, params, inputs))
    }

    /// Run one operator call
    ///
    /// Under [`ErrorPolicy::Lenient`] unknown operators and failed runs come
    /// back as [`CallOutput::Failed`]; every other error is returned as is.
    pub fn call(&self, request: InvocationRequest) -> Result<CallOutput> {
        match self.dispatch(&request) {
            Err(e) if e.is_recoverable() && self.config.error_policy == ErrorPolicy::Lenient => {
                warn!("{} failed: {}", request.operator, e);
                Ok(CallOutput::Failed(e.to_string()))
            }
            other => other,
        }
    }

    pub(crate) fn dispatch(&self, request: &InvocationRequest) -> Result<CallOutput> {
        let descriptor = self
            .catalog
            .get(&request.operator)
            .ok_or_else(|| CdoError::unknown_operator(&request.operator))?;

        let stdout_route = descriptor.writes_stdout()
            || request.output == Output::Stdout
            || request.return_shape == Some(ReturnShape::ParsedLines);
        let shape = if stdout_route {
            ReturnShape::ParsedLines
        } else {
            request
                .return_shape
                .clone()
                .unwrap_or_else(|| self.config.default_return_shape.clone())
        };

        if shape.needs_structured_data() && self.backend.is_none() {
            return Err(CdoError::unsupported_format(format!(
                "{shape:?} results need a data-file backend; rebuild with the `netcdf` feature"
            )));
        }

        let options =
            command::effective_options(&request.operator, request.options.as_deref(), &shape)?;
        let resolver = ResultResolver::new(self.backend.as_deref());
        let auto_split = request.auto_split.as_deref();

        if stdout_route {
            let command = command::build(self.executable(), request, &options, &[])?;
            let result = self.execute(request, command)?;
            return resolver.resolve(Produced::Stdout(result.stdout), &shape, auto_split);
        }

        match self.plan_outputs(descriptor, request)? {
            OutputPlan::Reuse(paths) => {
                debug!("Reusing existing output {:?}", paths);
                resolver.resolve(Produced::Files(paths), &shape, auto_split)
            }
            OutputPlan::Write { targets, produced } => {
                let command = command::build(self.executable(), request, &options, &targets)?;
                self.execute(request, command)?;
                resolver.resolve(produced, &shape, auto_split)
            }
        }
    }

    fn plan_outputs(
        &self,
        descriptor: &OperatorDescriptor,
        request: &InvocationRequest,
    ) -> Result<OutputPlan> {
        let count = match descriptor.output_arity {
            Arity::Fixed(n) if !descriptor.name.starts_with(SPLIT_FAMILY_PREFIX) => n as usize,
            _ => {
                return match &request.output {
                    Output::Path(prefix) => Ok(OutputPlan::Write {
                        targets: vec![prefix.clone()],
                        produced: Produced::Prefix(prefix.clone()),
                    }),
                    _ => Err(CdoError::invalid_request(
                        &descriptor.name,
                        "writes an input-dependent set of files and needs an output prefix",
                    )),
                };
            }
        };

        let targets = match &request.output {
            Output::Path(path) => vec![path.clone()],
            Output::Paths(paths) => paths.clone(),
            Output::Temp | Output::Stdout => {
                let targets = self.temp.new_files(count)?;
                return Ok(OutputPlan::Write {
                    produced: Produced::Files(targets.clone()),
                    targets,
                });
            }
        };

        if targets.len() != count {
            return Err(CdoError::invalid_request(
                &descriptor.name,
                format!("writes {count} output files, {} given", targets.len()),
            ));
        }

        let force = request.force.unwrap_or(self.config.force_output);
        if !force && targets.iter().all(|path| path.exists()) {
            return Ok(OutputPlan::Reuse(targets));
        }

        Ok(OutputPlan::Write {
            produced: Produced::Files(targets.clone()),
            targets,
        })
    }

    fn execute(
        &self,
        request: &InvocationRequest,
        command: ToolCommand,
    ) -> Result<ExecutionResult> {
        let result = self.executor.run(command.clone(), &request.env)?;

        if let Err(e) = resolver::classify(
            &request.operator,
            &command,
            &result,
            &self.version,
            &self.config.diff_exit_threshold,
        ) {
            error!("{}", e);
            self.executor.log_failure(&result);
            return Err(e);
        }

        Ok(result)
    }
}

impl fmt::Debug for Cdo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cdo")
            .field("executable", &self.config.executable)
            .field("version", &self.version)
            .field("operators", &self.catalog.len())
            .field("temp_dir", &self.temp.dir())
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

/// Whether `executable` names a runnable file, directly or through `PATH`
pub fn has_executable(executable: impl AsRef<Path>) -> bool {
    let executable = executable.as_ref();

    if executable.components().count() > 1 {
        return is_executable_file(executable);
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| is_executable_file(&dir.join(executable)))
        })
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
