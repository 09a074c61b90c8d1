//! Suite orchestration and reporting
//!
//! Every selected test case runs, in configured order, regardless of earlier
//! failures. Per-case errors become `(false, reason)` entries in the report.

use crate::error::Result;
use crate::executor::Executor;
use crate::performance::{PerformanceAggregator, ThresholdPolicy};
use crate::runner::{DifferentialRunner, RunnerSettings, TestCase};
use regex::Regex;
use serde::Serialize;
use std::fs;

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    /// Empty on success
    pub diagnostic: String,
}

/// Named pass/fail results in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub cases: Vec<CaseResult>,
}

impl SuiteReport {
    /// True when every case passed (vacuously true for an empty suite)
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn get(&self, name: &str) -> Option<&CaseResult> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed).count()
    }

    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        for case in &self.cases {
            if case.passed {
                report.push_str(&format!("{} ok\n", case.name));
            } else {
                report.push_str(&format!("{} failed: {}\n", case.name, case.diagnostic));
            }
        }
        report.push_str(&format!(
            "\n{} test cases, {} passed, {} failed\n",
            self.cases.len(),
            self.cases.len() - self.failed_count(),
            self.failed_count()
        ));
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs a list of test cases and collects a report
pub struct SuiteOrchestrator<E> {
    executor: E,
    settings: RunnerSettings,
    filter: Option<Regex>,
}

impl<E: Executor + Clone> SuiteOrchestrator<E> {
    pub fn new(executor: E, settings: RunnerSettings) -> Self {
        Self {
            executor,
            settings,
            filter: None,
        }
    }

    /// Only run cases whose name matches `filter`
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Run `cases`, as performance comparisons when `policy` is given
    ///
    /// Only a failure to create the working root is returned as an error;
    /// case failures are recorded in the report.
    pub fn run_suite(
        &self,
        cases: &[TestCase],
        policy: Option<&ThresholdPolicy>,
    ) -> Result<SuiteReport> {
        fs::create_dir_all(&self.settings.working_root)?;

        let selected: Vec<&TestCase> = cases
            .iter()
            .filter(|case| self.filter.as_ref().is_none_or(|f| f.is_match(&case.name)))
            .collect();
        tracing::info!(
            selected = selected.len(),
            total = cases.len(),
            performance = policy.is_some(),
            "running suite"
        );

        let mut report = SuiteReport::default();
        for case in selected {
            let outcome = match policy {
                Some(policy) => PerformanceAggregator::new(
                    self.executor.clone(),
                    self.settings.clone(),
                    policy.clone(),
                )
                .run_test_case(case),
                None => DifferentialRunner::new(self.executor.clone(), self.settings.clone())
                    .run_test_case(case),
            };

            let result = match outcome {
                Ok(()) => {
                    tracing::info!(case = %case.name, "passed");
                    CaseResult {
                        name: case.name.clone(),
                        passed: true,
                        diagnostic: String::new(),
                    }
                }
                Err(err) => {
                    tracing::warn!(case = %case.name, error = %err, "failed");
                    CaseResult {
                        name: case.name.clone(),
                        passed: false,
                        diagnostic: err.to_string(),
                    }
                }
            };
            report.cases.push(result);
        }
        Ok(report)
    }
}
