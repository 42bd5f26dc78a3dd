// tests/suite_registry_tests.rs
//
// Registry behavior through the public surface: derivation and rejection
// rules for classic suite names, alias semantics, and YAML batteries
// loaded from disk driving a real run.

use std::fs;

use drivebench::{
    AgentConfig, BenchmarkRunner, CruiseAgent, PassThrough, ProbeRecorder, RegistryFile,
    RunConfig, ScriptedWorld, SuiteError, SuiteKind, SuiteParams, SuiteRegistry, Task, TaskScript,
    Town,
};

/// Test: every classic name in the shipped battery derives a town and a
/// kind from the closed sets, and nothing else.
#[test]
fn test_standard_battery_derivations() {
    let registry = SuiteRegistry::standard();
    assert_eq!(registry.len(), 4);
    for suite in registry.suites() {
        assert!(matches!(suite.town, Town::Town01 | Town::Town02));
        assert_eq!(suite.kind, SuiteKind::Full);
        assert_eq!(suite.fail_on_collision, suite.kind == SuiteKind::NoCrash);
        assert_eq!(
            suite.poses_file,
            format!("corl2017/096/full_{}.txt", suite.town)
        );
    }
}

/// Test: a name with no recognizable town or kind is rejected with the
/// derivation error even when the same name was already rejected before,
/// and the registry stays empty.
#[test]
fn test_underivable_names_rejected_repeatably() {
    let mut registry = SuiteRegistry::new();
    for _ in 0..2 {
        assert!(matches!(
            registry.add("FullMidtown-v1", SuiteParams::default()),
            Err(SuiteError::UnknownTown { .. })
        ));
        assert!(matches!(
            registry.add("ScrambleTown01-v1", SuiteParams::default()),
            Err(SuiteError::UnknownKind { .. })
        ));
    }
    assert!(registry.is_empty());
}

/// Test: aliases resolve case-insensitively to the exact registered list,
/// and suite names never resolve as aliases.
#[test]
fn test_alias_resolution_rules() {
    let registry = SuiteRegistry::standard();
    let names = registry.resolve("TOWN1").expect("alias resolves");
    assert_eq!(names, ["FullTown01-v1", "FullTown01-v2"]);
    assert!(matches!(
        registry.resolve("FullTown01-v1"),
        Err(SuiteError::UnknownAlias { .. })
    ));
}

/// Test: a YAML battery read from disk validates its aliases and can
/// drive a complete run.
#[test]
fn test_yaml_battery_from_disk_drives_a_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let battery = dir.path().join("battery.yaml");
    fs::write(
        &battery,
        r#"
suites:
  - name: NoCrashTown02-v1
    n_vehicles: 50
    n_pedestrians: 100
    weathers: [1, 8, 14]
aliases:
  nocrash: [NoCrashTown02-v1]
"#,
    )
    .expect("battery written");

    let registry = RegistryFile::from_yaml_file(&battery)
        .expect("parses")
        .into_registry()
        .expect("validates");
    let suite = registry.get("NoCrashTown02-v1").expect("registered");
    assert!(suite.fail_on_collision);
    assert_eq!(suite.poses_file, "carla100/096/nocrash_Town02.txt");

    let config = RunConfig {
        suite: "nocrash".to_string(),
        model_path: dir.path().join("policy.bin"),
        max_count: 1,
        seed: 2019,
        resume: false,
        quiet: true,
    };
    let runner = BenchmarkRunner::new(&registry, config);
    let mut probe = ProbeRecorder::default();
    let report = runner
        .run(
            |_suite| {
                Ok(ScriptedWorld::new(TaskScript::succeed_after(2)).with_catalog(vec![Task {
                    weather: 1,
                    start: 38,
                    target: 34,
                    run_name: "w01_p038_034".to_string(),
                }]))
            },
            |_suite| Ok(CruiseAgent::new(AgentConfig::default())),
            &mut probe,
            &mut PassThrough,
        )
        .expect("run completes");
    assert_eq!(report.episodes, 1);
    assert_eq!(probe.run_names, ["w01_p038_034"]);
}

/// Test: a battery file whose alias points at an unregistered suite is
/// rejected as a whole.
#[test]
fn test_yaml_battery_rejects_dangling_alias() {
    let dir = tempfile::tempdir().expect("tempdir");
    let battery = dir.path().join("battery.yaml");
    fs::write(
        &battery,
        r#"
suites:
  - name: FullTown01-v1
aliases:
  all: [FullTown01-v1, FullTown03-v1]
"#,
    )
    .expect("battery written");

    let result = RegistryFile::from_yaml_file(&battery)
        .expect("parses")
        .into_registry();
    assert!(matches!(
        result,
        Err(SuiteError::UnknownSuite { ref suite, .. }) if suite == "FullTown03-v1"
    ));
}

/// Test: a missing battery file surfaces as an I/O error, not a panic.
#[test]
fn test_missing_battery_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = RegistryFile::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(SuiteError::IoError { .. })));
}
