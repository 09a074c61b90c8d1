// Performance regression detection over repeated differential runs
//
// Each test case is run `runsPerInstance` times on both binaries. Every
// invocation writes its own timing file; the samples are folded into
// min/max/mean per action plus a synthetic `total`, and the candidate's means
// are checked against the baseline's with a fixed allowance:
//
//   regression  <=>  candidate > baseline + max(absolute, baseline * relative / 100)
//
// No significance testing is attempted: repetitions only smooth out noise.

mod aggregator;
mod config;
mod verdict;

pub use aggregator::PerformanceAggregator;
pub use config::{PerformanceSection, ThresholdPolicy};
pub use verdict::{
    assess_performance, check_performance, PerformanceAssessment, PerformanceVerdict,
    RowComparison,
};

#[cfg(test)]
mod tests;
