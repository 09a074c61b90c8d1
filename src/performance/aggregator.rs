// Repeated differential runs feeding the performance verdict
//
// Working directories are prepared once per test case and kept across
// repetitions: every (repetition, step) pair writes a distinct timing file,
// and all of them are read back after the last repetition.

use crate::error::{HarnessError, Result};
use crate::executor::{prepare_directory, Executor};
use crate::invocation::Invocation;
use crate::performance::config::ThresholdPolicy;
use crate::performance::verdict::{assess_performance, PerformanceAssessment};
use crate::runner::{DifferentialRunner, RunnerSettings, Side, TestCase};
use crate::timing::{aggregate_directory, timing_file_name, write_stats, AGGREGATE_FILE_NAME};

/// Runs a test case repeatedly on both sides and compares timing profiles
pub struct PerformanceAggregator<E> {
    runner: DifferentialRunner<E>,
    policy: ThresholdPolicy,
}

impl<E: Executor> PerformanceAggregator<E> {
    pub fn new(executor: E, settings: RunnerSettings, policy: ThresholdPolicy) -> Self {
        Self {
            runner: DifferentialRunner::new(executor, settings),
            policy,
        }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Run and assess one test case
    ///
    /// Execution problems are errors; a completed comparison, passing or not,
    /// is returned as an assessment.
    pub fn assess_test_case(&self, case: &TestCase) -> Result<PerformanceAssessment> {
        self.policy
            .validate()
            .map_err(HarnessError::Configuration)?;
        if case.steps.is_empty() {
            return Err(HarnessError::MissingField(format!(
                "test case {} has no steps",
                case.name
            )));
        }

        let settings = self.runner.settings();
        let base_dir = settings.side_dir(&case.name, Side::Baseline);
        let test_dir = settings.side_dir(&case.name, Side::Candidate);
        prepare_directory(&base_dir)?;
        prepare_directory(&test_dir)?;

        let runs = self.policy.runs_per_instance;
        for run in 0..runs {
            tracing::info!(
                "Running test case {}, run {} of {}",
                case.name,
                run,
                runs
            );
            let steps: Vec<Invocation> = case
                .steps
                .iter()
                .enumerate()
                .map(|(step, invocation)| invocation.with_timing_file(timing_file_name(run, step)))
                .collect();

            self.runner
                .run_side(Side::Baseline, &base_dir, &steps)
                .and_then(|()| self.runner.run_side(Side::Candidate, &test_dir, &steps))
                .map_err(|source| HarnessError::RepetitionFailed {
                    run,
                    source: Box::new(source),
                })?;
        }

        let baseline = aggregate_directory(&base_dir, Side::Baseline, runs, case.steps.len())?;
        let candidate = aggregate_directory(&test_dir, Side::Candidate, runs, case.steps.len())?;
        write_stats(&base_dir.join(AGGREGATE_FILE_NAME), &baseline)?;
        write_stats(&test_dir.join(AGGREGATE_FILE_NAME), &candidate)?;

        let assessment = assess_performance(&baseline, &candidate, &self.policy);
        tracing::debug!(case = %case.name, "\n{}", assessment.to_report_string());
        Ok(assessment)
    }

    /// Run one test case; any failure or regression is an error
    pub fn run_test_case(&self, case: &TestCase) -> Result<()> {
        self.assess_test_case(case)?.into_result()
    }
}
