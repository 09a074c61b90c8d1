//! CLI argument parsing for cotejo

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the suite report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cotejo")]
#[command(version)]
#[command(
    about = "Differential regression and performance comparison of two program builds",
    long_about = None
)]
pub struct Cli {
    /// Suite configuration file (JSON, or TOML with a .toml extension)
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = crate::config::DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Only run test cases whose name matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Report format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Override the number of performance repetitions per test case
    #[arg(long, value_name = "N")]
    pub runs: Option<usize>,

    /// Ignore the performance section and only compare outputs
    #[arg(long = "no-performance")]
    pub no_performance: bool,

    /// Enable trace-level logging to stderr
    #[arg(long)]
    pub debug: bool,
}
