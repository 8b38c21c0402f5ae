//! Dispatch tests against a scripted tool

use super::*;
use crate::config::LogTarget;
use crate::datafile::{MemoryBackend, MemoryFile};
use crate::models::ArrayData;
use crate::runner::MockRunner;
use std::fs;
use tempfile::TempDir;

pub const LISTING: &str = "\
abs          Absolute value                          (1|1)
diffn        Compare two datasets                    (2|0)
eof          Empirical Orthogonal Functions          (1|2)
fldmean      Field mean                              (1|1)
sinfo        Short information                       (1|0)
showlevel    Show levels                             (1|0)
splitlevel   Split levels                            (1|-1)
stdatm       Standard atmosphere                     (0|1)
";

/// A mock answering the discovery calls of a tool reporting `version`
pub fn scripted_tool(version: &str) -> MockRunner {
    let mock = MockRunner::new();
    let banner = format!(
        "Climate Data Operators version {version} (https://mpimet.mpg.de/cdo)\n\
         Features: 16threads HDF5 NC4/HDF5/threadsafe OPeNDAP\n \
         NetCDF library version : 4.9.0 of Oct  3 2022\n"
    );
    mock.expect_args(&["-V"]).returns_stderr(&banner).finish();
    mock.expect_args(&["--operators"])
        .returns_stdout(LISTING)
        .finish();
    mock.expect_args(&["--config", "all"])
        .returns_stdout(r#"{"has-nc4":"yes","has-grb2":"no"}"#)
        .finish();
    mock
}

pub fn client(mock: &MockRunner, dir: &TempDir, config: ClientConfig) -> Cdo {
    Cdo::with_runner(
        config.with_temp_dir(dir.path().join("scratch")),
        Arc::new(mock.clone()),
    )
    .unwrap()
}

#[test]
fn test_construction_runs_discovery() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let cdo = client(&mock, &dir, ClientConfig::default());

    assert_eq!(cdo.version().raw(), "2.1.1");
    assert_eq!(cdo.operators().count(), 8);
    assert!(cdo.has_operator("splitlevel"));
    assert!(cdo.has_feature("has-nc4"));
    assert!(!cdo.has_feature("has-grb2"));
    assert!(cdo.has_lib("netcdf"));
    assert_eq!(cdo.lib_version("netcdf"), Some("4.9.0"));
    assert_eq!(mock.calls_containing("-V"), 2);
}

#[test]
fn test_failed_discovery_is_fatal() {
    let mock = MockRunner::new();
    mock.expect_args(&["-V"])
        .returns_stderr("cdo: error while loading shared libraries")
        .finish();

    let result = Cdo::with_runner(ClientConfig::default(), Arc::new(mock));
    assert!(matches!(result, Err(CdoError::VersionUnparseable { .. })));
}

#[test]
fn test_diff_exit_code_one_is_success_from_threshold() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("1.9.7");
    mock.expect(|args| args.iter().any(|a| a == "same.nc"))
        .returns_exit_code(1)
        .returns_stdout("0 of 1 records differ\n")
        .finish();
    mock.expect(|args| args.iter().any(|a| a == "broken.nc"))
        .returns_exit_code(2)
        .returns_stderr("cdo diffn (Abort): Open failed on >broken.nc<")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    let ok = cdo
        .call(InvocationRequest::new("diffn").inputs(["a.nc", "same.nc"]))
        .unwrap();
    assert_eq!(ok.into_lines().unwrap(), vec!["0 of 1 records differ"]);

    match cdo
        .call(InvocationRequest::new("diffn").inputs(["a.nc", "broken.nc"]))
        .unwrap_err()
    {
        CdoError::ExecutionFailed {
            command,
            exit_code,
            stderr,
        } => {
            assert_eq!(command, "cdo -O -diffn a.nc broken.nc");
            assert_eq!(exit_code, 2);
            assert!(stderr.contains("Open failed"));
        }
        other => panic!("Expected ExecutionFailed, got {other:?}"),
    }
}

#[test]
fn test_diff_exit_code_one_fails_below_threshold() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("1.9.7");
    mock.expect_containing("-diffn").returns_exit_code(1).finish();
    let cdo = client(
        &mock,
        &dir,
        ClientConfig::default().with_diff_exit_threshold("2.0.0".parse().unwrap()),
    );

    let result = cdo.call(InvocationRequest::new("diffn").inputs(["a.nc", "b.nc"]));
    assert!(matches!(result, Err(CdoError::ExecutionFailed { exit_code: 1, .. })));
}

#[test]
fn test_unknown_operator_never_spawns() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let strict = client(&mock, &dir, ClientConfig::default());
    let lenient = client(&mock, &dir, ClientConfig::default().lenient());
    mock.clear_history();

    let err = strict
        .call(InvocationRequest::new("nonexistent").input("in.nc"))
        .unwrap_err();
    assert!(matches!(err, CdoError::UnknownOperator { ref name } if name == "nonexistent"));

    let sentinel = lenient
        .call(InvocationRequest::new("nonexistent").input("in.nc"))
        .unwrap();
    assert!(sentinel.is_failed());

    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_lenient_policy_folds_execution_failures() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs")
        .returns_exit_code(1)
        .returns_stderr("cdo abs (Abort): Open failed")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default().lenient());

    match cdo.call(InvocationRequest::new("abs").input("missing.nc")).unwrap() {
        CallOutput::Failed(reason) => assert!(reason.contains("Open failed")),
        other => panic!("Expected Failed, got {other:?}"),
    }
}

#[test]
fn test_zero_output_operator_returns_lines() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-showlevel")
        .returns_stdout(" 0 10 100 \n")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    let lines = cdo
        .call(
            InvocationRequest::new("showlevel")
                .input("-stdatm,0,10,100")
                .output(dir.path().join("ignored.nc")),
        )
        .unwrap()
        .into_lines()
        .unwrap();

    assert_eq!(lines, vec!["0 10 100"]);
    let command = mock.call_history().pop().unwrap();
    assert_eq!(command.args, vec!["-O", "-showlevel", "-stdatm,0,10,100"]);
    assert!(!dir.path().join("ignored.nc").exists());
}

#[test]
fn test_zero_output_operator_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-sinfo")
        .returns_stdout("   File format : NetCDF2\n    -1 :       Institut Source   T Steptype\n")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    let first = cdo.call(InvocationRequest::new("sinfo").input("in.nc")).unwrap();
    let second = cdo.call(InvocationRequest::new("sinfo").input("in.nc")).unwrap();
    assert_eq!(first.into_lines(), second.into_lines());
}

#[test]
fn test_auto_split_collapses_single_line() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-showlevel")
        .returns_stdout(" 0 10 100\n")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    match cdo
        .call(InvocationRequest::new("showlevel").input("x.nc").auto_split(" "))
        .unwrap()
    {
        CallOutput::Fields(fields) => assert_eq!(fields, vec!["0", "10", "100"]),
        other => panic!("Expected Fields, got {other:?}"),
    }
}

#[test]
fn test_implicit_temp_outputs_follow_arity() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs").writes_last_arg().finish();
    mock.expect_operator("eof").finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    let path = cdo
        .call(InvocationRequest::new("abs").input("in.nc"))
        .unwrap()
        .into_path()
        .unwrap();
    assert!(path.starts_with(dir.path().join("scratch")));
    assert!(path.exists());

    let paths = cdo
        .call(InvocationRequest::new("eof").param(4).input("in.nc"))
        .unwrap()
        .into_paths()
        .unwrap();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);

    let command = mock.call_history().pop().unwrap();
    let tail: Vec<PathBuf> = command.args[3..].iter().map(PathBuf::from).collect();
    assert_eq!(tail, paths);

    assert_eq!(cdo.cleanup(), 3);
    assert!(!path.exists());
}

#[test]
fn test_explicit_outputs_must_match_arity() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let cdo = client(&mock, &dir, ClientConfig::default());

    let err = cdo
        .call(
            InvocationRequest::new("eof")
                .param(4)
                .input("in.nc")
                .output(dir.path().join("only_one.nc")),
        )
        .unwrap_err();
    assert!(matches!(err, CdoError::InvalidRequest { .. }));
}

#[test]
fn test_existing_output_is_reused_without_force() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs").writes_last_arg().finish();
    let cdo = client(&mock, &dir, ClientConfig::default());
    let target = dir.path().join("abs.nc");

    let first = cdo
        .call(InvocationRequest::new("abs").input("in.nc").output(&target))
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(mock.calls_containing("-abs"), 1);

    let reused = cdo
        .call(
            InvocationRequest::new("abs")
                .input("in.nc")
                .output(&target)
                .force(false),
        )
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(reused, first);
    assert_eq!(mock.calls_containing("-abs"), 1);

    cdo.call(InvocationRequest::new("abs").input("in.nc").output(&target))
        .unwrap();
    assert_eq!(mock.calls_containing("-abs"), 2);
}

#[test]
fn test_client_wide_force_off() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs").writes_last_arg().finish();
    let cdo = client(&mock, &dir, ClientConfig::default().with_force_output(false));
    let target = dir.path().join("abs.nc");
    fs::write(&target, "existing").unwrap();

    cdo.call(InvocationRequest::new("abs").input("in.nc").output(&target))
        .unwrap();
    assert_eq!(mock.calls_containing("-abs"), 0);

    cdo.call(
        InvocationRequest::new("abs")
            .input("in.nc")
            .output(&target)
            .force(true),
    )
    .unwrap();
    assert_eq!(mock.calls_containing("-abs"), 1);
}

#[test]
fn test_split_operator_discovers_files_under_prefix() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-splitlevel")
        .with_effect(|command| {
            let prefix = command.args.last().unwrap();
            for level in ["000000", "000010", "000100"] {
                fs::write(format!("{prefix}{level}.nc"), "x").unwrap();
            }
        })
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());
    let prefix = dir.path().join("lev");

    let paths = cdo
        .call(
            InvocationRequest::new("splitlevel")
                .input("-stdatm,0,10,100")
                .output(&prefix),
        )
        .unwrap()
        .into_paths()
        .unwrap();

    assert_eq!(paths.len(), 3);
    for (path, level) in paths.iter().zip(["000000", "000010", "000100"]) {
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("lev"));
        assert!(name.contains(level));
    }
}

#[test]
fn test_split_operator_requires_prefix() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let cdo = client(&mock, &dir, ClientConfig::default());
    mock.clear_history();

    let err = cdo
        .call(InvocationRequest::new("splitlevel").input("in.nc"))
        .unwrap_err();
    assert!(matches!(err, CdoError::InvalidRequest { .. }));
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_array_result_through_backend() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_operator("stdatm").writes_last_arg().finish();
    let target = dir.path().join("atm.nc");
    let backend = MemoryBackend::new();
    backend.insert(
        &target,
        MemoryFile::default().with_variable(
            "T",
            ArrayData {
                shape: vec![1, 1, 1, 1],
                values: vec![288.0],
            },
            None,
        ),
    );
    let cdo = client(&mock, &dir, ClientConfig::default()).with_backend(Arc::new(backend));

    let array = cdo
        .call(
            InvocationRequest::new("stdatm")
                .param(0)
                .output(&target)
                .return_array("T"),
        )
        .unwrap()
        .into_array()
        .unwrap();

    assert_eq!(array.values.len(), 1);
    assert!((array.values[0] - 288.0).abs() < 1e-3);

    let command = mock.call_history().pop().unwrap();
    assert_eq!(command.args[..4], ["-O", "-f", "nc", "-stdatm,0"]);

    let missing = cdo.call(
        InvocationRequest::new("stdatm")
            .param(0)
            .output(&target)
            .return_array("P"),
    );
    assert!(matches!(missing, Err(CdoError::VariableNotFound { .. })));
}

fn temperature_file(fill: Option<f64>) -> MemoryFile {
    MemoryFile::default().with_variable(
        "T",
        ArrayData {
            shape: vec![1, 4],
            values: vec![288.0, -9e33, 271.9, -9e33],
        },
        fill,
    )
}

#[test]
fn test_handles_follow_output_arity() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_operator("fldmean").finish();
    mock.expect_operator("eof").finish();
    mock.expect_containing("-splitlevel")
        .with_effect(|command| {
            let prefix = command.args.last().unwrap();
            fs::write(format!("{prefix}000100.nc"), "x").unwrap();
        })
        .finish();

    let mean = dir.path().join("mean.nc");
    let (values, vectors) = (dir.path().join("eval.nc"), dir.path().join("evec.nc"));
    let level = dir.path().join("lev000100.nc");
    let backend = MemoryBackend::new();
    for path in [&mean, &values, &vectors, &level] {
        backend.insert(path, temperature_file(None));
    }
    let cdo = client(&mock, &dir, ClientConfig::default()).with_backend(Arc::new(backend));

    let single = cdo
        .call(
            InvocationRequest::new("fldmean")
                .input("in.nc")
                .output(&mean)
                .return_shape(ReturnShape::Handle),
        )
        .unwrap();
    match single {
        CallOutput::Handle(handle) => assert_eq!(handle.path(), mean.as_path()),
        other => panic!("Expected Handle, got {other:?}"),
    }

    let pair = cdo
        .call(
            InvocationRequest::new("eof")
                .param(4)
                .input("in.nc")
                .outputs([&values, &vectors])
                .return_shape(ReturnShape::Handle),
        )
        .unwrap();
    match pair {
        CallOutput::Handles(handles) => {
            let paths: Vec<&Path> = handles.iter().map(|h| h.path()).collect();
            assert_eq!(paths, vec![values.as_path(), vectors.as_path()]);
        }
        other => panic!("Expected Handles, got {other:?}"),
    }

    let split = cdo
        .call(
            InvocationRequest::new("splitlevel")
                .input("in.nc")
                .output(dir.path().join("lev"))
                .return_shape(ReturnShape::Handle),
        )
        .unwrap();
    match split {
        CallOutput::Handles(handles) => {
            assert_eq!(handles.len(), 1);
            assert_eq!(handles[0].path(), level.as_path());
        }
        other => panic!("Expected Handles, got {other:?}"),
    }
}

#[test]
fn test_masked_array_result_through_backend() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_operator("fldmean").finish();
    let target = dir.path().join("mean.nc");
    let backend = MemoryBackend::new();
    backend.insert(&target, temperature_file(Some(-9e33)));
    let cdo = client(&mock, &dir, ClientConfig::default()).with_backend(Arc::new(backend));

    let masked = cdo
        .call(
            InvocationRequest::new("fldmean")
                .input("in.nc")
                .output(&target)
                .return_masked_array("T"),
        )
        .unwrap()
        .into_masked()
        .unwrap();

    assert_eq!(masked.mask, vec![false, true, false, true]);
    assert_eq!(masked.valid().count(), 2);

    let command = mock.call_history().pop().unwrap();
    assert_eq!(command.args[..3], ["-O", "-f", "nc"]);
}

#[test]
fn test_array_without_backend_is_unsupported_even_when_lenient() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let cdo = client(&mock, &dir, ClientConfig::default().lenient()).without_backend();
    mock.clear_history();

    let err = cdo
        .call(InvocationRequest::new("stdatm").param(0).return_array("T"))
        .unwrap_err();
    assert!(matches!(err, CdoError::UnsupportedFormat { .. }));
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_environment_layering() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs").finish();
    let cdo = client(
        &mock,
        &dir,
        ClientConfig::default().with_env("CDO_FILE_SUFFIX", ".nc"),
    );

    cdo.call(
        InvocationRequest::new("abs")
            .input("in.nc")
            .env("CDO_FILE_SUFFIX", ".grb"),
    )
    .unwrap();
    cdo.call(InvocationRequest::new("abs").input("in.nc"))
        .unwrap();

    let calls: Vec<_> = mock
        .call_history()
        .into_iter()
        .filter(|c| c.args.iter().any(|a| a == "-abs"))
        .collect();
    assert_eq!(calls[0].env["CDO_FILE_SUFFIX"], ".grb");
    assert_eq!(calls[1].env["CDO_FILE_SUFFIX"], ".nc");
}

#[test]
fn test_nested_expression_as_input() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-fldmean").finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    let inner = cdo.expr("stdatm", &[0.into()], &[] as &[&str]).unwrap();
    let middle = cdo.expr("abs", &[], &[inner]).unwrap();
    cdo.call(InvocationRequest::new("fldmean").input(middle))
        .unwrap();

    let command = mock.call_history().pop().unwrap();
    assert_eq!(command.args[1..4], ["-fldmean", "-abs", "-stdatm,0"]);
    assert!(cdo.expr("nonexistent", &[], &["x.nc"]).is_err());
}

#[test]
fn test_help_text() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_args(&["-h", "sinfo"])
        .returns_stdout("NAME\n    sinfo - Short information\n")
        .finish();
    let cdo = client(&mock, &dir, ClientConfig::default());

    assert!(cdo.help("sinfo").unwrap().contains("Short information"));
    assert!(matches!(
        cdo.help("nonexistent"),
        Err(CdoError::UnknownOperator { .. })
    ));
}

#[test]
fn test_invocation_log() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    mock.expect_containing("-abs")
        .returns_exit_code(1)
        .returns_stderr("cdo abs (Abort): Open failed")
        .finish();
    let cdo = client(
        &mock,
        &dir,
        ClientConfig::default().with_log_target(LogTarget::Memory),
    );

    let _ = cdo.call(InvocationRequest::new("abs").input("missing.nc"));

    let log = cdo.collect_logs().unwrap();
    assert!(log.contains("INFO - cdo -O -abs missing.nc"));
    assert!(log.contains("ERROR - cdo abs (Abort): Open failed"));
}

#[test]
fn test_set_executable_rediscovers() {
    let dir = TempDir::new().unwrap();
    let mock = scripted_tool("2.1.1");
    let mut cdo = client(&mock, &dir, ClientConfig::default());
    mock.clear_history();

    cdo.set_executable("/opt/cdo/bin/cdo").unwrap();

    assert_eq!(cdo.executable(), "/opt/cdo/bin/cdo");
    let history = mock.call_history();
    assert!(history.len() >= 3);
    assert!(history.iter().all(|c| c.program == "/opt/cdo/bin/cdo"));

    mock.clear_history();
    cdo.rebuild_catalog().unwrap();
    assert_eq!(mock.calls_containing("--operators"), 1);
}

#[test]
fn test_has_executable() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("fake-cdo");
    fs::write(&script, "#!/bin/sh\n").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        assert!(!has_executable(&script));
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    }

    assert!(has_executable(&script));
    assert!(!has_executable(dir.path().join("missing")));
}
