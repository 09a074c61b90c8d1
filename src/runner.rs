//! Differential runner: baseline vs. candidate over one test case
//!
//! Each side runs the whole step sequence inside its own working directory,
//! so step *k* sees the files written by step *k-1*. The first failing step
//! aborts that side. Only when both sides complete are the final outputs
//! compared byte for byte.

use crate::error::{HarnessError, Result};
use crate::executor::{prepare_directory, Executor};
use crate::invocation::Invocation;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Which binary a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Baseline,
    Candidate,
}

impl Side {
    /// Suffix appended to the test case name for this side's working directory
    pub fn dir_suffix(self) -> &'static str {
        match self {
            Side::Baseline => "_base",
            Side::Candidate => "_test",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Baseline => write!(f, "Baseline"),
            Side::Candidate => write!(f, "Candidate"),
        }
    }
}

/// Progress of one differential comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    PendingBaseline,
    RunningBaseline,
    PendingCandidate,
    RunningCandidate,
    Comparing,
    Passed,
    Failed,
}

/// A named, ordered sequence of invocations
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<Invocation>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<Invocation>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Output file of the last step, which is what gets compared
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(Invocation::output)
    }
}

/// Suite-wide locations handed to every runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub working_root: PathBuf,
    pub baseline_binary: PathBuf,
    pub candidate_binary: PathBuf,
}

impl RunnerSettings {
    pub fn binary(&self, side: Side) -> &Path {
        match side {
            Side::Baseline => &self.baseline_binary,
            Side::Candidate => &self.candidate_binary,
        }
    }

    /// Working directory owned by `side` for the test case `name`
    pub fn side_dir(&self, name: &str, side: Side) -> PathBuf {
        self.working_root.join(format!("{}{}", name, side.dir_suffix()))
    }
}

/// Drives baseline and candidate through a test case and diffs the results
pub struct DifferentialRunner<E> {
    executor: E,
    settings: RunnerSettings,
}

impl<E: Executor> DifferentialRunner<E> {
    pub fn new(executor: E, settings: RunnerSettings) -> Self {
        Self { executor, settings }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run every step of `steps` on one side, in order, inside `dir`
    ///
    /// Does not prepare `dir`; callers own its lifetime across repetitions.
    pub fn run_side(&self, side: Side, dir: &Path, steps: &[Invocation]) -> Result<()> {
        let binary = self.settings.binary(side);
        let total = steps.len();

        // Render everything first so an incomplete invocation fails before any launch
        let arg_lists = steps
            .iter()
            .map(Invocation::to_args)
            .collect::<Result<Vec<_>>>()?;

        for (index, args) in arg_lists.iter().enumerate() {
            let step = index + 1;
            tracing::debug!(%side, step, total, "running step");
            let result = self.executor.execute(dir, binary, args).map_err(|source| {
                HarnessError::ExecutionEnvironment {
                    side,
                    step,
                    total,
                    source: Box::new(source),
                }
            })?;
            if !result.succeeded {
                tracing::warn!(%side, step, total, "step failed, skipping remaining steps");
                return Err(HarnessError::StepFailed {
                    side,
                    step,
                    total,
                    output: result.output,
                });
            }
        }
        Ok(())
    }

    /// Run a full differential comparison for one test case
    pub fn run_test_case(&self, case: &TestCase) -> Result<()> {
        let mut state = RunState::PendingBaseline;
        let outcome = self.drive(case, &mut state);
        let final_state = if outcome.is_ok() {
            RunState::Passed
        } else {
            RunState::Failed
        };
        tracing::debug!(case = %case.name, from = ?state, to = ?final_state, "transition");
        outcome
    }

    fn drive(&self, case: &TestCase, state: &mut RunState) -> Result<()> {
        let output = case.final_output().ok_or_else(|| {
            HarnessError::MissingField(format!("test case {} has no steps", case.name))
        })?;

        let base_dir = self.settings.side_dir(&case.name, Side::Baseline);
        let test_dir = self.settings.side_dir(&case.name, Side::Candidate);

        transition(case, state, RunState::RunningBaseline);
        prepare_directory(&base_dir)?;
        self.run_side(Side::Baseline, &base_dir, &case.steps)?;

        transition(case, state, RunState::PendingCandidate);
        transition(case, state, RunState::RunningCandidate);
        prepare_directory(&test_dir)?;
        self.run_side(Side::Candidate, &test_dir, &case.steps)?;

        transition(case, state, RunState::Comparing);
        let base_file = base_dir.join(output);
        let test_file = test_dir.join(output);
        if !base_file.exists() {
            return Err(HarnessError::OutputMissing {
                side: Side::Baseline,
                path: base_file,
            });
        }
        if !test_file.exists() {
            return Err(HarnessError::OutputMissing {
                side: Side::Candidate,
                path: test_file,
            });
        }

        if !files_identical(&base_file, &test_file)? {
            tracing::info!(
                case = %case.name,
                baseline_sha256 = %file_digest(&base_file)?,
                candidate_sha256 = %file_digest(&test_file)?,
                "outputs differ"
            );
            return Err(HarnessError::OutputMismatch);
        }
        Ok(())
    }
}

fn transition(case: &TestCase, state: &mut RunState, next: RunState) {
    tracing::trace!(case = %case.name, from = ?*state, to = ?next, "transition");
    *state = next;
}

/// Byte-exact file comparison
///
/// Files of different length are never equal; two empty files are.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if a.metadata()?.len() != b.metadata()?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a)?);
    let mut reader_b = BufReader::new(File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];

    loop {
        let n = read_full(&mut reader_a, &mut buf_a)?;
        let m = read_full(&mut reader_b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of input
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Hex SHA-256 of a file's contents
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
