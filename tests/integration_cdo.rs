//! Integration tests against an installed CDO binary
//!
//! Every test skips itself when no `cdo` is found on the PATH, so the suite
//! stays green on machines without the tool.

use cdo_client::{Cdo, CdoError, ClientConfig, ErrorPolicy, InvocationRequest};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const STDATM: &str = "-stdatm,0,10,100";

/// Client bound to the system binary with scratch files kept inside `dir`
fn system_client(dir: &TempDir) -> Option<Cdo> {
    if !cdo_client::has_executable("cdo") {
        println!("Skipping integration test - cdo not found on PATH");
        return None;
    }

    let config = ClientConfig::default()
        .with_executable("cdo")
        .with_temp_dir(dir.path().join("scratch"));
    Some(Cdo::with_config(config).expect("Failed to bind the system cdo binary"))
}

fn modified(path: &Path) -> std::time::SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

#[test]
fn test_discovery_finds_common_operators() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    for operator in ["sinfo", "showlevel", "stdatm", "splitlevel", "fldmean"] {
        assert!(cdo.has_operator(operator), "{operator} should be listed");
    }
    assert!(cdo.catalog().len() > 100);
}

#[test]
fn test_showlevel_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let request = InvocationRequest::new("showlevel").input(STDATM);
    let first = cdo.call(request.clone()).unwrap().into_lines().unwrap();
    let second = cdo.call(request).unwrap().into_lines().unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].split_whitespace().collect::<Vec<_>>(), ["0", "10", "100"]);
    assert_eq!(
        cdo.boundary_levels(STDATM).unwrap(),
        vec![0.0, 0.0, 20.0, 180.0]
    );
}

#[test]
fn test_sinfo_lines() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let lines = cdo
        .call(InvocationRequest::new("sinfo").input(STDATM))
        .unwrap()
        .into_lines()
        .unwrap();
    assert!(!lines.is_empty());
}

#[test]
fn test_split_level_writes_one_file_per_level() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let prefix = dir.path().join("lev");
    let paths = cdo
        .call(
            InvocationRequest::new("splitlevel")
                .input(STDATM)
                .output(&prefix),
        )
        .unwrap()
        .into_paths()
        .unwrap();

    assert_eq!(paths.len(), 3);
    for path in &paths {
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("lev"));
    }
}

#[test]
fn test_existing_output_is_reused_unless_forced() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let output = dir.path().join("atm.nc");
    let request = InvocationRequest::new("stdatm")
        .param(vec![0, 10, 100])
        .output(&output);

    cdo.call(request.clone()).unwrap();
    let written = modified(&output);

    thread::sleep(Duration::from_millis(1100));
    let reused = cdo.call(request.clone().force(false)).unwrap();
    assert_eq!(reused.into_path().unwrap(), output);
    assert_eq!(modified(&output), written);

    cdo.call(request.force(true)).unwrap();
    assert!(modified(&output) > written);
}

#[test]
fn test_temp_outputs_are_cleaned_up() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let path = cdo
        .call(InvocationRequest::new("stdatm").param(vec![0, 10]))
        .unwrap()
        .into_path()
        .unwrap();
    assert!(path.exists());

    assert_eq!(cdo.cleanup(), 1);
    assert!(!path.exists());
}

#[test]
fn test_unknown_operator() {
    let dir = TempDir::new().unwrap();
    let Some(mut cdo) = system_client(&dir) else {
        return;
    };

    let result = cdo.call(InvocationRequest::new("noSuchOperator").input(STDATM));
    assert!(matches!(result, Err(CdoError::UnknownOperator { .. })));

    cdo.set_error_policy(ErrorPolicy::Lenient);
    let output = cdo
        .call(InvocationRequest::new("noSuchOperator").input(STDATM))
        .unwrap();
    assert!(output.is_failed());
}

#[test]
fn test_failed_run_reports_stderr() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let missing = dir.path().join("missing.nc");
    let result = cdo.call(InvocationRequest::new("sinfo").input(missing.to_string_lossy()));

    match result {
        Err(CdoError::ExecutionFailed { stderr, .. }) => assert!(!stderr.is_empty()),
        other => panic!("Expected ExecutionFailed, got {other:?}"),
    }
}

#[cfg(feature = "netcdf")]
#[test]
fn test_standard_atmosphere_surface_temperature() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let array = cdo
        .call(
            InvocationRequest::new("stdatm")
                .param(0)
                .return_array("T"),
        )
        .unwrap()
        .into_array()
        .unwrap();

    assert!((array.values[0] - 288.0).abs() < 0.5);
}

#[cfg(feature = "netcdf")]
#[test]
fn test_raw_path_and_array_agree() {
    let dir = TempDir::new().unwrap();
    let Some(cdo) = system_client(&dir) else {
        return;
    };

    let path = cdo
        .call(InvocationRequest::new("stdatm").param(vec![0, 10, 100]).options("-f nc"))
        .unwrap()
        .into_path()
        .unwrap();

    let via_file = cdo
        .call(
            InvocationRequest::new("copy")
                .input(path.to_string_lossy())
                .return_array("P"),
        )
        .unwrap()
        .into_array()
        .unwrap();
    let direct = cdo
        .call(
            InvocationRequest::new("stdatm")
                .param(vec![0, 10, 100])
                .return_array("P"),
        )
        .unwrap()
        .into_array()
        .unwrap();

    assert_eq!(via_file.values, direct.values);
}
