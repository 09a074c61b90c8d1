//! Process execution for one invocation of a binary under test

use crate::error::{HarnessError, Result};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};

/// Outcome of one process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// True when the process exited with status 0
    pub succeeded: bool,
    /// Standard output and standard error, interleaved
    pub output: String,
}

impl RunResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: output.into(),
        }
    }
}

/// Runs one argument vector against one binary inside a working directory
///
/// A non-zero exit is a normal [`RunResult`]; only failures to launch the
/// binary at all are errors.
pub trait Executor {
    fn execute(&self, working_dir: &Path, binary: &Path, args: &[String]) -> Result<RunResult>;
}

impl<F> Executor for F
where
    F: Fn(&Path, &Path, &[String]) -> Result<RunResult>,
{
    fn execute(&self, working_dir: &Path, binary: &Path, args: &[String]) -> Result<RunResult> {
        self(working_dir, binary, args)
    }
}

/// Remove `dir` if it exists and recreate it empty
pub fn prepare_directory(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Executor that launches real child processes
///
/// The child blocks the caller until it exits; no timeout is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, working_dir: &Path, binary: &Path, args: &[String]) -> Result<RunResult> {
        fs::create_dir_all(working_dir)?;
        tracing::debug!(
            binary = %binary.display(),
            dir = %working_dir.display(),
            ?args,
            "launching"
        );

        let launch_error = |source: io::Error| HarnessError::Launch {
            binary: binary.to_path_buf(),
            source,
        };

        // Relative paths are taken from the harness directory, not the child's
        let program = if binary.is_relative() && binary.components().count() > 1 {
            std::path::absolute(binary).map_err(launch_error)?
        } else {
            binary.to_path_buf()
        };

        // Both streams share one pipe so the captured text keeps its interleaving
        let (mut reader, writer) = io::pipe()?;
        let mut child = {
            let mut command = Command::new(&program);
            command
                .args(args)
                .current_dir(working_dir)
                .stdin(Stdio::null())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            command.spawn().map_err(launch_error)?
            // `command` holds the write ends; dropping it here lets the read hit EOF
        };

        let mut captured = Vec::new();
        reader.read_to_end(&mut captured)?;
        let status = child.wait()?;

        let output = String::from_utf8_lossy(&captured).into_owned();
        tracing::debug!(
            binary = %binary.display(),
            status = ?status.code(),
            "process finished"
        );

        Ok(RunResult {
            succeeded: status.success(),
            output,
        })
    }
}
