// End-to-end scenarios for repeated performance runs
//
// The program under test is simulated by a closure that writes the declared
// output and a timing file whose durations depend on the binary.

use super::*;
use crate::error::{HarnessError, Result};
use crate::executor::RunResult;
use crate::invocation::Invocation;
use crate::runner::{RunnerSettings, Side, TestCase};
use crate::timing::{read_stats, AGGREGATE_FILE_NAME};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn settings(root: &Path) -> RunnerSettings {
    RunnerSettings {
        working_root: root.to_path_buf(),
        baseline_binary: PathBuf::from("basebin"),
        candidate_binary: PathBuf::from("testbin"),
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .map(|pos| args[pos + 1].clone())
}

/// Simulated program: fixed durations per binary
fn timed_run(
    dir: &Path,
    binary: &Path,
    args: &[String],
    baseline: &str,
    candidate: &str,
) -> Result<RunResult> {
    let out = flag_value(args, "-o").expect("no -o");
    fs::write(dir.join(out), "123")?;
    let timings = if binary == Path::new("basebin") {
        baseline
    } else {
        candidate
    };
    if let Some(timing_file) = flag_value(args, "-t") {
        fs::write(dir.join(timing_file), timings)?;
    }
    Ok(RunResult::success(""))
}

fn two_step_case() -> TestCase {
    TestCase::new(
        "perfcase",
        vec![
            Invocation::new("in.graph", "vga.graph", "VGA"),
            Invocation::new("vga.graph", "out.graph", "LINK"),
        ],
    )
}

/// Scenario: identical binaries produce identical timings
/// Expected: no regression, aggregate files written on both sides
#[test]
fn test_identical_timings_pass() {
    let temp = TempDir::new().unwrap();
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        timed_run(
            dir,
            binary,
            args,
            "action,duration\nload,1.0\nrun,2.0\n",
            "action,duration\nload,1.0\nrun,2.0\n",
        )
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::default());

    let assessment = aggregator.assess_test_case(&two_step_case()).unwrap();
    assert!(assessment.passed());

    let base_stats = read_stats(
        &temp
            .path()
            .join("perfcase_base")
            .join(AGGREGATE_FILE_NAME),
    )
    .unwrap();
    let names: Vec<_> = base_stats.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(names, vec!["load", "run", "total"]);
    // two steps per repetition, each writing load=1 and run=2
    assert_eq!(base_stats[2].mean, 6.0);
}

/// Scenario: candidate is 10s slower on one phase
/// Expected: regression reported for that phase
#[test]
fn test_slow_candidate_regresses() {
    let temp = TempDir::new().unwrap();
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        timed_run(
            dir,
            binary,
            args,
            "action,duration\nload,1.0\nrun,2.0\n",
            "action,duration\nload,1.0\nrun,12.0\n",
        )
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(2, 5.0, 5.0));

    let err = aggregator.run_test_case(&two_step_case()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Performance regression: run took 12s instead of 2s"
    );
}

/// Scenario: each repetition writes its own timing file per step
/// Expected: runs x steps distinct files on each side
#[test]
fn test_timing_files_are_distinct_per_repetition_and_step() {
    let temp = TempDir::new().unwrap();
    let seen = RefCell::new(Vec::new());
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        if binary == Path::new("basebin") {
            seen.borrow_mut().push(flag_value(args, "-t").unwrap());
        }
        timed_run(dir, binary, args, "action,duration\n", "action,duration\n")
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(3, 1.0, 1.0));
    aggregator.run_test_case(&two_step_case()).unwrap();

    assert_eq!(
        seen.into_inner(),
        vec![
            "timings_0_0.csv",
            "timings_0_1.csv",
            "timings_1_0.csv",
            "timings_1_1.csv",
            "timings_2_0.csv",
            "timings_2_1.csv",
        ]
    );
}

/// Scenario: the candidate fails during the second repetition
/// Expected: aggregation never happens, the repetition is named
#[test]
fn test_failed_repetition_aborts_aggregation() {
    let temp = TempDir::new().unwrap();
    let calls = RefCell::new(0usize);
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        if binary == Path::new("testbin") {
            *calls.borrow_mut() += 1;
            // fail on the first step of repetition 1
            if *calls.borrow() == 3 {
                return Ok(RunResult::failure("Boom!"));
            }
        }
        timed_run(dir, binary, args, "action,duration\n", "action,duration\n")
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(3, 1.0, 1.0));

    let err = aggregator.run_test_case(&two_step_case()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Run 1 failed with message: Candidate run failed at step 1 of 2: Boom!"
    );
    assert!(!temp
        .path()
        .join("perfcase_base")
        .join(AGGREGATE_FILE_NAME)
        .exists());
}

/// Scenario: the program ignores `-t`
/// Expected: missing timing file reported with its path
#[test]
fn test_missing_timing_file() {
    let temp = TempDir::new().unwrap();
    let executor = |dir: &Path, _: &Path, args: &[String]| -> Result<RunResult> {
        fs::write(dir.join(flag_value(args, "-o").unwrap()), "123")?;
        Ok(RunResult::success(""))
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(1, 1.0, 1.0));

    match aggregator.run_test_case(&two_step_case()).unwrap_err() {
        HarnessError::TimingFileMissing { side, path } => {
            assert_eq!(side, Side::Baseline);
            assert!(path.ends_with("timings_0_0.csv"));
        }
        other => panic!("Expected TimingFileMissing, got {:?}", other),
    }
}

/// Scenario: the candidate reports a phase the baseline does not have
/// Expected: label mismatch rather than a numeric verdict
#[test]
fn test_label_mismatch_between_sides() {
    let temp = TempDir::new().unwrap();
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        timed_run(
            dir,
            binary,
            args,
            "action,duration\nload,1.0\n",
            "action,duration\nparse,1.0\n",
        )
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(1, 1.0, 1.0));

    let err = aggregator.run_test_case(&two_step_case()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "performance line mismatch: baseline 'load', candidate 'parse'"
    );
}

/// Scenario: the candidate reports a NaN duration
/// Expected: the case fails on malformed timing data instead of passing
#[test]
fn test_nan_duration_fails_the_case() {
    let temp = TempDir::new().unwrap();
    let executor = |dir: &Path, binary: &Path, args: &[String]| {
        timed_run(
            dir,
            binary,
            args,
            "action,duration\nrun,1.0\n",
            "action,duration\nrun,NaN\n",
        )
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(1, 5.0, 5.0));

    match aggregator.run_test_case(&two_step_case()).unwrap_err() {
        HarnessError::MalformedTiming { path, reason } => {
            assert!(path.ends_with("perfcase_test/timings_0_0.csv"));
            assert!(reason.contains("NaN"));
        }
        other => panic!("Expected MalformedTiming, got {:?}", other),
    }
}

#[test]
fn test_invalid_policy_is_configuration_error() {
    let temp = TempDir::new().unwrap();
    let executor = |_: &Path, _: &Path, _: &[String]| -> Result<RunResult> {
        panic!("nothing should run");
    };
    let aggregator =
        PerformanceAggregator::new(executor, settings(temp.path()), ThresholdPolicy::new(0, 1.0, 1.0));
    assert!(matches!(
        aggregator.run_test_case(&two_step_case()),
        Err(HarnessError::Configuration(_))
    ));
}
