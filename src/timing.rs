//! Timing side-channel files and their aggregation
//!
//! The program under test writes one CSV per invocation with at least the
//! columns `action` and `duration` (seconds). Repeated runs are folded into
//! one `action,min,max,average` table per side, closed by a synthetic
//! `total` row built from per-repetition sums.

use crate::error::{HarnessError, Result};
use crate::runner::Side;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Label of the synthetic row summing every sample of one repetition
pub const TOTAL_ACTION: &str = "total";

/// File holding the aggregated table inside each side's directory
pub const AGGREGATE_FILE_NAME: &str = "timings_all.csv";

/// Timing file written for step `step` of repetition `repetition`
pub fn timing_file_name(repetition: usize, step: usize) -> String {
    format!("timings_{}_{}.csv", repetition, step)
}

/// One labelled phase duration
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSample {
    pub action: String,
    pub duration: f64,
}

/// Summary of every sample sharing one label
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregatedStat {
    pub action: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl AggregatedStat {
    fn from_values(action: String, values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self {
            action,
            min,
            max,
            mean,
        }
    }
}

/// Parse a timing file
pub fn read_timings(path: &Path) -> Result<Vec<TimingSample>> {
    let content = fs::read_to_string(path)?;
    parse_timings(&content).map_err(|reason| HarnessError::MalformedTiming {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse timing CSV text; rows are returned in file order
pub fn parse_timings(content: &str) -> std::result::Result<Vec<TimingSample>, String> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| "missing header row".to_string())?;
    let columns = split_record(header);
    let action_col = column(&columns, "action")?;
    let duration_col = column(&columns, "duration")?;

    lines
        .enumerate()
        .map(|(row, line)| -> std::result::Result<TimingSample, String> {
            let fields = split_record(line);
            let action = fields
                .get(action_col)
                .ok_or_else(|| format!("row {} has no action", row + 1))?;
            let duration = fields
                .get(duration_col)
                .ok_or_else(|| format!("row {} has no duration", row + 1))?;
            let duration = parse_seconds(duration)
                .map_err(|e| format!("row {}: invalid duration '{}': {}", row + 1, duration, e))?;
            Ok(TimingSample {
                action: action.clone(),
                duration,
            })
        })
        .collect()
}

/// Parse a duration in seconds; only finite, non-negative values compare
fn parse_seconds(raw: &str) -> std::result::Result<f64, String> {
    let value = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() || value < 0.0 {
        return Err("must be a finite, non-negative number".to_string());
    }
    Ok(value)
}

fn column(columns: &[String], name: &str) -> std::result::Result<usize, String> {
    columns
        .iter()
        .position(|c| c.trim() == name)
        .ok_or_else(|| format!("header has no '{}' column", name))
}

/// Split one CSV record, honouring double-quoted fields
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Fold repetitions into per-label statistics
///
/// `repetitions[i]` holds every sample from every step of repetition `i`.
/// Labels keep their first-seen order; the `total` row comes last.
pub fn aggregate(repetitions: &[Vec<TimingSample>]) -> Vec<AggregatedStat> {
    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, Vec<f64>> = HashMap::new();
    let mut totals = Vec::with_capacity(repetitions.len());

    for samples in repetitions {
        let mut total = 0.0;
        for sample in samples {
            if sample.action == TOTAL_ACTION {
                tracing::warn!("timing label '{}' is reserved, sample ignored", TOTAL_ACTION);
                continue;
            }
            total += sample.duration;
            values
                .entry(sample.action.clone())
                .or_insert_with(|| {
                    order.push(sample.action.clone());
                    Vec::new()
                })
                .push(sample.duration);
        }
        totals.push(total);
    }

    let mut stats: Vec<AggregatedStat> = order
        .into_iter()
        .map(|action| {
            let samples = &values[&action];
            AggregatedStat::from_values(action, samples)
        })
        .collect();

    if !totals.is_empty() {
        stats.push(AggregatedStat::from_values(TOTAL_ACTION.to_string(), &totals));
    }
    stats
}

/// Read and aggregate every `(repetition, step)` timing file of one side
pub fn aggregate_directory(
    dir: &Path,
    side: Side,
    repetitions: usize,
    steps: usize,
) -> Result<Vec<AggregatedStat>> {
    let mut per_repetition = Vec::with_capacity(repetitions);
    for repetition in 0..repetitions {
        let mut samples = Vec::new();
        for step in 0..steps {
            let path = dir.join(timing_file_name(repetition, step));
            if !path.exists() {
                return Err(HarnessError::TimingFileMissing { side, path });
            }
            samples.extend(read_timings(&path)?);
        }
        per_repetition.push(samples);
    }
    Ok(aggregate(&per_repetition))
}

/// Render the aggregated table
pub fn stats_to_csv(stats: &[AggregatedStat]) -> String {
    let mut output = String::from("action,min,max,average\n");
    for stat in stats {
        output.push_str(&format!(
            "{},{},{},{}\n",
            escape_field(&stat.action),
            stat.min,
            stat.max,
            stat.mean
        ));
    }
    output
}

pub fn write_stats(path: &Path, stats: &[AggregatedStat]) -> Result<()> {
    fs::write(path, stats_to_csv(stats))?;
    Ok(())
}

/// Read an aggregated table written by [`write_stats`]
pub fn read_stats(path: &Path) -> Result<Vec<AggregatedStat>> {
    let malformed = |reason: String| HarnessError::MalformedTiming {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| malformed("missing header row".to_string()))?;
    let columns = split_record(header);
    let cols = ["action", "min", "max", "average"]
        .iter()
        .map(|name| column(&columns, name))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(malformed)?;

    lines
        .enumerate()
        .map(|(row, line)| -> Result<AggregatedStat> {
            let fields = split_record(line);
            let field = |i: usize| -> Result<&String> {
                fields
                    .get(cols[i])
                    .ok_or_else(|| malformed(format!("row {} is too short", row + 1)))
            };
            let number = |i: usize| -> Result<f64> {
                let raw = field(i)?;
                parse_seconds(raw)
                    .map_err(|e| malformed(format!("row {}: invalid number '{}': {}", row + 1, raw, e)))
            };
            Ok(AggregatedStat {
                action: field(0)?.clone(),
                min: number(1)?,
                max: number(2)?,
                mean: number(3)?,
            })
        })
        .collect()
}
