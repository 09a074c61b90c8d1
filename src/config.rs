//! Suite configuration loading
//!
//! A suite file names the working root, the two binaries, an ordered set of
//! test cases and an optional `performance` section. JSON and TOML are both
//! accepted, chosen by file extension.
//!
//! # Example
//! ```json
//! {
//!   "rundir": "rundir",
//!   "basebinlocation": "../baseline/depthmapXcli",
//!   "testbinlocation": "../build/depthmapXcli",
//!   "testcases": {
//!     "vga_metric": [
//!       { "infile": "in.graph", "outfile": "out.graph", "mode": "VGA",
//!         "options": [ { "visibility": { "mode": "metric", "radius": "7" } } ] }
//!     ]
//!   },
//!   "performance": { "runsPerInstance": 3 }
//! }
//! ```

use crate::error::{HarnessError, Result};
use crate::invocation::{ArgValue, Invocation, OptionGroup};
use crate::performance::{PerformanceSection, ThresholdPolicy};
use crate::runner::{RunnerSettings, TestCase};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

/// Default suite file looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "regressionconfig.json";

/// Loosely typed on/off value as written by hand in suite files
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// Switch semantics: only an explicit yes turns something on
    pub fn is_enabled(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Text(s) => matches!(s.as_str(), "True" | "true" | "1" | "yes"),
        }
    }

    /// Presence semantics: anything but an explicit false turns it on
    pub fn is_set(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Text(s) => s != "false",
        }
    }
}

/// Map deserialized into a list that keeps document order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!("duplicate key '{}'", key)));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// One step as written in the suite file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub infile: String,
    pub outfile: String,
    pub mode: String,
    #[serde(default)]
    pub simple: Option<FlagValue>,
    #[serde(default)]
    pub options: Vec<OptionGroup>,
    #[serde(default)]
    pub extra_args: OrderedMap<ArgValue>,
}

impl StepConfig {
    pub fn to_invocation(&self) -> Invocation {
        let simple = self.simple.as_ref().is_some_and(FlagValue::is_set);
        let mut invocation =
            Invocation::new(&self.infile, &self.outfile, &self.mode).with_simple_mode(simple);
        for group in &self.options {
            invocation = invocation.with_option(group.clone());
        }
        if !self.extra_args.0.is_empty() {
            invocation = invocation.with_option(OptionGroup::Extra(self.extra_args.0.clone()));
        }
        invocation
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiteFile {
    rundir: PathBuf,
    #[serde(alias = "basebinlocation")]
    baseline_binary: PathBuf,
    #[serde(alias = "testbinlocation")]
    candidate_binary: PathBuf,
    testcases: OrderedMap<Vec<StepConfig>>,
    #[serde(default)]
    performance: Option<PerformanceSection>,
}

/// Fully resolved suite
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub settings: RunnerSettings,
    pub test_cases: Vec<TestCase>,
    /// `None` when performance comparison is disabled
    pub performance: Option<ThresholdPolicy>,
}

impl SuiteConfig {
    /// Load a suite file; any problem is a [`HarnessError::Configuration`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::Configuration(format!(
                "Failed to read suite file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let config = if is_toml {
            Self::from_toml_str(&content, base_dir)
        } else {
            Self::from_json_str(&content, base_dir)
        }
        .map_err(|e| match e {
            HarnessError::Configuration(msg) => {
                HarnessError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        tracing::info!(
            suite = %path.display(),
            cases = config.test_cases.len(),
            performance = config.performance.is_some(),
            "loaded suite"
        );
        Ok(config)
    }

    /// Parse JSON text; relative paths resolve against `base_dir`
    pub fn from_json_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: SuiteFile = serde_json::from_str(content)
            .map_err(|e| HarnessError::Configuration(e.to_string()))?;
        Self::resolve(file, base_dir)
    }

    /// Parse TOML text; relative paths resolve against `base_dir`
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: SuiteFile =
            toml::from_str(content).map_err(|e| HarnessError::Configuration(e.to_string()))?;
        Self::resolve(file, base_dir)
    }

    fn resolve(file: SuiteFile, base_dir: &Path) -> Result<Self> {
        let mut test_cases = Vec::with_capacity(file.testcases.0.len());
        for (name, steps) in file.testcases.0 {
            if steps.is_empty() {
                return Err(HarnessError::Configuration(format!(
                    "test case '{}' has no steps",
                    name
                )));
            }
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(HarnessError::Configuration(format!(
                    "test case name '{}' cannot be used as a directory name",
                    name
                )));
            }
            if let Some(step) = steps.iter().find(|s| !stays_in_side_dir(&s.outfile)) {
                return Err(HarnessError::Configuration(format!(
                    "test case '{}': outfile '{}' must be a relative path inside the working directory",
                    name, step.outfile
                )));
            }
            let steps = steps.iter().map(StepConfig::to_invocation).collect();
            test_cases.push(TestCase::new(name, steps));
        }

        let performance = file.performance.and_then(PerformanceSection::into_policy);
        if let Some(policy) = &performance {
            policy.validate().map_err(HarnessError::Configuration)?;
        }

        Ok(SuiteConfig {
            settings: RunnerSettings {
                working_root: base_dir.join(&file.rundir),
                baseline_binary: resolve_binary(base_dir, &file.baseline_binary),
                candidate_binary: resolve_binary(base_dir, &file.candidate_binary),
            },
            test_cases,
            performance,
        })
    }
}

/// Outputs are written and compared per side, so they cannot leave the side directory
fn stays_in_side_dir(file: &str) -> bool {
    Path::new(file)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Bare names are left for PATH lookup; other relative paths follow the suite file
fn resolve_binary(base_dir: &Path, binary: &Path) -> PathBuf {
    if binary.is_absolute() || binary.components().count() == 1 {
        binary.to_path_buf()
    } else {
        base_dir.join(binary)
    }
}
