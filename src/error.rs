//! Error taxonomy for differential runs
//!
//! Only [`HarnessError::Configuration`] is fatal for a whole suite. Every other
//! kind is caught at the test-case boundary and reported as a failed case.

use crate::runner::Side;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or running a differential comparison
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Malformed suite or invocation definition
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invocation or option group lacks a required field
    #[error("{0}")]
    MissingField(String),

    /// The binary under test could not be launched at all
    #[error("Failed to launch {}: {source}", binary.display())]
    Launch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executor failed at a given step; remaining steps on that side were skipped
    #[error("{side} run failed at step {step} of {total}: {source}")]
    ExecutionEnvironment {
        side: Side,
        /// 1-based step position
        step: usize,
        total: usize,
        #[source]
        source: Box<HarnessError>,
    },

    /// A step exited non-zero; remaining steps on that side were skipped
    #[error("{side} run failed at step {step} of {total}: {output}")]
    StepFailed {
        side: Side,
        /// 1-based step position
        step: usize,
        total: usize,
        output: String,
    },

    #[error("{side} output {} does not exist", path.display())]
    OutputMissing { side: Side, path: PathBuf },

    #[error("Test outputs differ")]
    OutputMismatch,

    #[error("{side} performance timing file {} is missing", path.display())]
    TimingFileMissing { side: Side, path: PathBuf },

    /// Row count or label disagreement between the two aggregated stat lists
    #[error("{0}")]
    TimingRowMismatch(String),

    #[error("Malformed timing file {}: {reason}", path.display())]
    MalformedTiming { path: PathBuf, reason: String },

    #[error("Performance regression: {action} took {candidate}s instead of {baseline}s")]
    PerformanceRegression {
        action: String,
        baseline: f64,
        candidate: f64,
    },

    /// One repetition of a performance run failed
    #[error("Run {run} failed with message: {source}")]
    RepetitionFailed {
        run: usize,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
