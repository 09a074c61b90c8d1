//! Cotejo - differential regression and performance comparison harness
//!
//! Runs the same pipelines of command-line invocations against a baseline
//! and a candidate build of a program, then checks that the final outputs are
//! byte-identical. Optionally repeats every test case, aggregates the timing
//! files written by the program, and flags phases where the candidate is
//! slower than the baseline by more than a configured allowance.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod invocation;
pub mod performance;
pub mod runner;
pub mod suite;
pub mod timing;
