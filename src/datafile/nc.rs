//! netCDF result files through the native netcdf library.

use super::{DataFileBackend, DataHandle, mask_fill_values};
use crate::error::{CdoError, Result};
use crate::models::{ArrayData, MaskedArray};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Opens results read-only with `netcdf::open`
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfBackend;

pub struct NetcdfHandle {
    path: PathBuf,
    file: netcdf::File,
}

impl DataFileBackend for NetcdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn DataHandle>> {
        let file = netcdf::open(path)
            .map_err(|e| CdoError::data_file(path, format!("Failed to open NetCDF: {e}")))?;

        Ok(Box::new(NetcdfHandle {
            path: path.to_path_buf(),
            file,
        }))
    }
}

impl NetcdfHandle {
    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| CdoError::VariableNotFound {
                path: self.path.clone(),
                variable: name.to_string(),
            })
    }

    fn read(&self, var: &netcdf::Variable<'_>) -> Result<ArrayData> {
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values(..).map_err(|e| {
            CdoError::data_file(&self.path, format!("Failed to read {}: {e}", var.name()))
        })?;

        Ok(ArrayData { shape, values })
    }
}

/// Check for an attribute without provoking HDF5 error output
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

impl DataHandle for NetcdfHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.file.variables().map(|v| v.name()).collect())
    }

    fn values(&self, variable: &str) -> Result<ArrayData> {
        let var = self.variable(variable)?;
        self.read(&var)
    }

    fn masked_values(&self, variable: &str) -> Result<MaskedArray> {
        let var = self.variable(variable)?;
        let fill = get_f64_attr(&var, "_FillValue");
        Ok(mask_fill_values(self.read(&var)?, fill))
    }
}
