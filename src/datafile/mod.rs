//! Access to structured-data result files.
//!
//! The dispatcher only needs four things from a data-file library: open a
//! file, list its variables, read a variable densely, and read it with a
//! missing-value mask. Those are the [`DataFileBackend`] and [`DataHandle`]
//! traits. The netCDF implementation is compiled with the `netcdf` feature;
//! without it array-shaped results fail with `UnsupportedFormat`.

#[cfg(feature = "netcdf")]
pub mod nc;

use crate::error::{CdoError, Result};
use crate::models::{ArrayData, MaskedArray};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens result files
pub trait DataFileBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DataHandle>>;
}

/// An open result file
pub trait DataHandle {
    fn path(&self) -> &Path;

    fn variable_names(&self) -> Result<BTreeSet<String>>;

    fn values(&self, variable: &str) -> Result<ArrayData>;

    fn masked_values(&self, variable: &str) -> Result<MaskedArray>;

    fn has_variable(&self, variable: &str) -> Result<bool> {
        Ok(self.variable_names()?.contains(variable))
    }
}

/// The backend compiled into this build, if any
pub fn default_backend() -> Option<Arc<dyn DataFileBackend>> {
    #[cfg(feature = "netcdf")]
    {
        Some(Arc::new(self::nc::NetcdfBackend))
    }
    #[cfg(not(feature = "netcdf"))]
    {
        None
    }
}

/// Mask entries equal to `fill`, or nothing when no fill value is declared
pub fn mask_fill_values(data: ArrayData, fill: Option<f64>) -> MaskedArray {
    let mask = match fill {
        Some(fill) => data.values.iter().map(|v| *v == fill).collect(),
        None => vec![false; data.values.len()],
    };

    MaskedArray {
        shape: data.shape,
        values: data.values,
        mask,
    }
}

/// In-memory backend, useful when results are produced by a scripted runner
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    files: Arc<std::sync::Mutex<std::collections::HashMap<PathBuf, MemoryFile>>>,
}

/// Variables of one in-memory file: values plus optional fill value
#[derive(Debug, Default, Clone)]
pub struct MemoryFile {
    pub variables: std::collections::BTreeMap<String, (ArrayData, Option<f64>)>,
}

impl MemoryFile {
    pub fn with_variable(mut self, name: &str, data: ArrayData, fill: Option<f64>) -> Self {
        self.variables.insert(name.to_string(), (data, fill));
        self
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the contents served for `path`
    pub fn insert(&self, path: impl Into<PathBuf>, file: MemoryFile) {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into(), file);
    }
}

struct MemoryHandle {
    path: PathBuf,
    file: MemoryFile,
}

impl DataFileBackend for MemoryBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn DataHandle>> {
        let files = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file = files
            .get(path)
            .cloned()
            .ok_or_else(|| CdoError::data_file(path, "no such in-memory file"))?;

        Ok(Box::new(MemoryHandle {
            path: path.to_path_buf(),
            file,
        }))
    }
}

impl MemoryHandle {
    fn variable(&self, variable: &str) -> Result<&(ArrayData, Option<f64>)> {
        self.file
            .variables
            .get(variable)
            .ok_or_else(|| CdoError::VariableNotFound {
                path: self.path.clone(),
                variable: variable.to_string(),
            })
    }
}

impl DataHandle for MemoryHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.file.variables.keys().cloned().collect())
    }

    fn values(&self, variable: &str) -> Result<ArrayData> {
        Ok(self.variable(variable)?.0.clone())
    }

    fn masked_values(&self, variable: &str) -> Result<MaskedArray> {
        let (data, fill) = self.variable(variable)?;
        Ok(mask_fill_values(data.clone(), *fill))
    }
}
