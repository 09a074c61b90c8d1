// Performance verdict: lock-step comparison of aggregated timing tables
//
// Both tables must list the same actions in the same order, `total` last.
// Means are compared row by row; the first row outside the allowance decides
// the verdict.

use crate::error::{HarnessError, Result};
use crate::performance::config::ThresholdPolicy;
use crate::timing::AggregatedStat;

/// Final verdict for one performance comparison
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceVerdict {
    /// Every candidate mean is within the allowance
    NoRegression,

    /// The candidate is slower than allowed for `action`
    Regression {
        action: String,
        baseline_mean: f64,
        candidate_mean: f64,
    },

    /// The two tables cannot be compared row by row
    RowMismatch { reason: String },
}

/// One compared row
#[derive(Debug, Clone, PartialEq)]
pub struct RowComparison {
    pub action: String,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    pub allowance: f64,
    pub regressed: bool,
}

/// Detailed performance comparison result
#[derive(Debug, Clone)]
pub struct PerformanceAssessment {
    pub verdict: PerformanceVerdict,

    /// Rows compared before the verdict was reached
    pub rows: Vec<RowComparison>,

    pub policy: ThresholdPolicy,
}

impl PerformanceAssessment {
    pub fn passed(&self) -> bool {
        self.verdict == PerformanceVerdict::NoRegression
    }

    /// Convert into the error reported for a failed test case
    pub fn into_result(self) -> Result<()> {
        match self.verdict {
            PerformanceVerdict::NoRegression => Ok(()),
            PerformanceVerdict::Regression {
                action,
                baseline_mean,
                candidate_mean,
            } => Err(HarnessError::PerformanceRegression {
                action,
                baseline: baseline_mean,
                candidate: candidate_mean,
            }),
            PerformanceVerdict::RowMismatch { reason } => {
                Err(HarnessError::TimingRowMismatch(reason))
            }
        }
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        match &self.verdict {
            PerformanceVerdict::NoRegression => {
                report.push_str("✅ NO PERFORMANCE REGRESSION\n\n");
            }
            PerformanceVerdict::Regression {
                action,
                baseline_mean,
                candidate_mean,
            } => {
                report.push_str(&format!(
                    "❌ PERFORMANCE REGRESSION in {}: {:.3}s -> {:.3}s\n\n",
                    action, baseline_mean, candidate_mean
                ));
            }
            PerformanceVerdict::RowMismatch { reason } => {
                report.push_str("⚠️  TIMING TABLES DO NOT MATCH\n\n");
                report.push_str(&format!("Reason: {}\n\n", reason));
            }
        }

        report.push_str(&format!(
            "Runs per instance: {}, allowance: max({}s, {}%)\n",
            self.policy.runs_per_instance,
            self.policy.absolute_threshold_in_seconds,
            self.policy.relative_threshold_in_percent
        ));

        if !self.rows.is_empty() {
            report.push_str("\n📊 Compared actions:\n");
            for row in &self.rows {
                report.push_str(&format!(
                    "  {} {} (baseline={:.3}s, candidate={:.3}s, allowance={:.3}s)\n",
                    if row.regressed { "✗" } else { "✓" },
                    row.action,
                    row.baseline_mean,
                    row.candidate_mean,
                    row.allowance
                ));
            }
        }

        report
    }
}

/// Compare candidate means against baseline means, row by row
pub fn assess_performance(
    baseline: &[AggregatedStat],
    candidate: &[AggregatedStat],
    policy: &ThresholdPolicy,
) -> PerformanceAssessment {
    let mut rows = Vec::new();
    let finish = |verdict, rows| PerformanceAssessment {
        verdict,
        rows,
        policy: policy.clone(),
    };

    if baseline.len() != candidate.len() {
        let relation = if baseline.len() < candidate.len() {
            "fewer"
        } else {
            "more"
        };
        let reason = format!(
            "baseline performance stats have {} rows than the candidate ones ({} vs {})",
            relation,
            baseline.len(),
            candidate.len()
        );
        return finish(PerformanceVerdict::RowMismatch { reason }, rows);
    }

    for (base, test) in baseline.iter().zip(candidate) {
        if base.action != test.action {
            let reason = format!(
                "performance line mismatch: baseline '{}', candidate '{}'",
                base.action, test.action
            );
            return finish(PerformanceVerdict::RowMismatch { reason }, rows);
        }

        let regressed = policy.is_regression(base.mean, test.mean);
        rows.push(RowComparison {
            action: base.action.clone(),
            baseline_mean: base.mean,
            candidate_mean: test.mean,
            allowance: policy.allowance(base.mean),
            regressed,
        });

        if regressed {
            let verdict = PerformanceVerdict::Regression {
                action: base.action.clone(),
                baseline_mean: base.mean,
                candidate_mean: test.mean,
            };
            return finish(verdict, rows);
        }
    }

    finish(PerformanceVerdict::NoRegression, rows)
}

/// Shorthand for [`assess_performance`] followed by [`PerformanceAssessment::into_result`]
pub fn check_performance(
    baseline: &[AggregatedStat],
    candidate: &[AggregatedStat],
    policy: &ThresholdPolicy,
) -> Result<()> {
    assess_performance(baseline, candidate, policy).into_result()
}
