use anyhow::{Context, Result};
use clap::Parser;
use cotejo::cli::{Cli, OutputFormat};
use cotejo::config::SuiteConfig;
use cotejo::executor::ProcessExecutor;
use cotejo::suite::SuiteOrchestrator;
use regex::Regex;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces trace level
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = SuiteConfig::from_file(&args.config)?;

    let policy = match (config.performance, args.no_performance) {
        (_, true) | (None, false) => None,
        (Some(mut policy), false) => {
            if let Some(runs) = args.runs {
                policy.runs_per_instance = runs;
            }
            policy
                .validate()
                .map_err(|reason| anyhow::anyhow!("Invalid --runs: {}", reason))?;
            Some(policy)
        }
    };

    let mut orchestrator = SuiteOrchestrator::new(ProcessExecutor::new(), config.settings);
    if let Some(pattern) = &args.filter {
        let filter =
            Regex::new(pattern).with_context(|| format!("Invalid --filter pattern {}", pattern))?;
        orchestrator = orchestrator.with_filter(filter);
    }

    let report = orchestrator.run_suite(&config.test_cases, policy.as_ref())?;

    match args.format {
        OutputFormat::Text => print!("{}", report.to_report_string()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
