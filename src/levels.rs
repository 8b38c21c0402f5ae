//! Vertical layer geometry derived from level midpoints.
//!
//! `showlevel` prints the midpoint of each layer. Starting from a surface
//! boundary at 0, each next boundary mirrors the previous one across the
//! layer midpoint.

use crate::client::Cdo;
use crate::error::{CdoError, Result};
use crate::models::InvocationRequest;

/// Layer boundaries for the given midpoints, starting at 0
pub fn boundaries_from_midpoints(midpoints: &[f64]) -> Vec<f64> {
    let mut boundaries = Vec::with_capacity(midpoints.len() + 1);
    boundaries.push(0.0);
    for (i, level) in midpoints.iter().enumerate() {
        let previous = boundaries[i];
        boundaries.push(previous + 2.0 * (level - previous));
    }
    boundaries
}

/// Distance between consecutive boundaries
pub fn thicknesses(boundaries: &[f64]) -> Vec<f64> {
    boundaries.windows(2).map(|w| w[1] - w[0]).collect()
}

impl Cdo {
    /// Level midpoints of the first variable of `input`
    pub fn levels(&self, input: &str) -> Result<Vec<f64>> {
        let lines = self
            .dispatch(&InvocationRequest::new("showlevel").input(input))?
            .into_lines()
            .unwrap_or_default();
        let first = lines.first().map(String::as_str).unwrap_or_default();

        first
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    CdoError::invalid_request("showlevel", format!("unparseable level '{token}'"))
                })
            })
            .collect()
    }

    /// Layer boundaries of `input`, from the surface upwards
    pub fn boundary_levels(&self, input: &str) -> Result<Vec<f64>> {
        Ok(boundaries_from_midpoints(&self.levels(input)?))
    }

    /// Layer thicknesses of `input`
    pub fn thickness_of_levels(&self, input: &str) -> Result<Vec<f64>> {
        Ok(thicknesses(&self.boundary_levels(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client, scripted_tool};
    use crate::config::ClientConfig;
    use tempfile::TempDir;

    #[test]
    fn test_boundaries_mirror_across_midpoints() {
        assert_eq!(
            boundaries_from_midpoints(&[5.0, 15.0, 30.0]),
            vec![0.0, 10.0, 20.0, 40.0]
        );
        assert_eq!(boundaries_from_midpoints(&[]), vec![0.0]);
    }

    #[test]
    fn test_thicknesses() {
        assert_eq!(thicknesses(&[0.0, 10.0, 20.0, 40.0]), vec![10.0, 10.0, 20.0]);
        assert!(thicknesses(&[0.0]).is_empty());
    }

    #[test]
    fn test_levels_from_tool() {
        let dir = TempDir::new().unwrap();
        let mock = scripted_tool("2.1.1");
        mock.expect_containing("-showlevel")
            .returns_stdout(" 5 15 30 \n")
            .finish();
        let cdo = client(&mock, &dir, ClientConfig::default());

        assert_eq!(
            cdo.boundary_levels("ocean.nc").unwrap(),
            vec![0.0, 10.0, 20.0, 40.0]
        );
        assert_eq!(
            cdo.thickness_of_levels("ocean.nc").unwrap(),
            vec![10.0, 10.0, 20.0]
        );
    }

    #[test]
    fn test_failures_are_raised_even_when_lenient() {
        let dir = TempDir::new().unwrap();
        let mock = scripted_tool("2.1.1");
        mock.expect_containing("-showlevel")
            .returns_exit_code(1)
            .finish();
        let cdo = client(&mock, &dir, ClientConfig::default().lenient());

        assert!(matches!(
            cdo.boundary_levels("missing.nc"),
            Err(CdoError::ExecutionFailed { .. })
        ));
    }
}
