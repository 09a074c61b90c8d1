// Threshold policy for performance comparison
//
// All fields of the `performance` section are optional. An absent or empty
// section disables performance comparison; any other section enables it
// unless `enabled` says otherwise.

use crate::config::FlagValue;
use serde::{Deserialize, Serialize};

/// Allowances for candidate slowdown and the number of repetitions
///
/// # Example
/// ```
/// use cotejo::performance::ThresholdPolicy;
///
/// let policy = ThresholdPolicy::new(3, 5.0, 5.0);
/// assert!(!policy.is_regression(100.0, 104.9));
/// assert!(policy.is_regression(100.0, 105.1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPolicy {
    /// How many times each test case runs per side
    pub runs_per_instance: usize,

    /// Slowdown allowed relative to the baseline mean, in percent
    pub relative_threshold_in_percent: f64,

    /// Slowdown allowed in absolute seconds
    ///
    /// Whichever of the two allowances is larger applies.
    pub absolute_threshold_in_seconds: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            runs_per_instance: 3,
            relative_threshold_in_percent: 1.0,
            absolute_threshold_in_seconds: 1.0,
        }
    }
}

impl ThresholdPolicy {
    pub fn new(runs_per_instance: usize, relative_percent: f64, absolute_seconds: f64) -> Self {
        Self {
            runs_per_instance,
            relative_threshold_in_percent: relative_percent,
            absolute_threshold_in_seconds: absolute_seconds,
        }
    }

    /// Seconds the candidate may exceed `baseline_mean` by
    pub fn allowance(&self, baseline_mean: f64) -> f64 {
        self.absolute_threshold_in_seconds
            .max(baseline_mean * self.relative_threshold_in_percent / 100.0)
    }

    pub fn is_regression(&self, baseline_mean: f64, candidate_mean: f64) -> bool {
        candidate_mean > baseline_mean + self.allowance(baseline_mean)
    }

    /// Validate policy
    pub fn validate(&self) -> Result<(), String> {
        if self.runs_per_instance < 1 {
            return Err(format!(
                "runsPerInstance must be >= 1, got {}",
                self.runs_per_instance
            ));
        }

        if !self.relative_threshold_in_percent.is_finite() || self.relative_threshold_in_percent < 0.0
        {
            return Err(format!(
                "relativeThresholdInPercent must be a non-negative number, got {}",
                self.relative_threshold_in_percent
            ));
        }

        if !self.absolute_threshold_in_seconds.is_finite() || self.absolute_threshold_in_seconds < 0.0
        {
            return Err(format!(
                "absoluteThresholdInSeconds must be a non-negative number, got {}",
                self.absolute_threshold_in_seconds
            ));
        }

        Ok(())
    }
}

/// The `performance` section as written in a suite file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PerformanceSection {
    pub enabled: Option<FlagValue>,
    pub runs_per_instance: Option<usize>,
    pub relative_threshold_in_percent: Option<f64>,
    pub absolute_threshold_in_seconds: Option<f64>,
}

impl PerformanceSection {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.runs_per_instance.is_none()
            && self.relative_threshold_in_percent.is_none()
            && self.absolute_threshold_in_seconds.is_none()
    }

    /// The policy to apply, or `None` when performance comparison is off
    pub fn into_policy(self) -> Option<ThresholdPolicy> {
        if self.is_empty() {
            return None;
        }
        if let Some(enabled) = &self.enabled {
            if !enabled.is_enabled() {
                return None;
            }
        }

        let defaults = ThresholdPolicy::default();
        Some(ThresholdPolicy {
            runs_per_instance: self.runs_per_instance.unwrap_or(defaults.runs_per_instance),
            relative_threshold_in_percent: self
                .relative_threshold_in_percent
                .unwrap_or(defaults.relative_threshold_in_percent),
            absolute_threshold_in_seconds: self
                .absolute_threshold_in_seconds
                .unwrap_or(defaults.absolute_threshold_in_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(json: &str) -> PerformanceSection {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.runs_per_instance, 3);
        assert_eq!(policy.relative_threshold_in_percent, 1.0);
        assert_eq!(policy.absolute_threshold_in_seconds, 1.0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_allowance_takes_larger_bound() {
        let policy = ThresholdPolicy::new(3, 5.0, 5.0);
        assert_eq!(policy.allowance(10.0), 5.0);
        assert_eq!(policy.allowance(100.0), 5.0);
        assert_eq!(policy.allowance(1000.0), 50.0);
    }

    #[test]
    fn test_is_regression_examples() {
        let policy = ThresholdPolicy::new(3, 5.0, 5.0);
        assert!(!policy.is_regression(100.0, 104.9));
        assert!(policy.is_regression(100.0, 105.1));
        assert!(policy.is_regression(10.0, 15.01));
        assert!(!policy.is_regression(10.0, 15.0));
    }

    #[test]
    fn test_faster_candidate_never_regresses() {
        let policy = ThresholdPolicy::new(1, 0.0, 0.0);
        assert!(!policy.is_regression(10.0, 9.0));
        assert!(!policy.is_regression(10.0, 10.0));
    }

    #[test]
    fn test_invalid_policies() {
        assert!(ThresholdPolicy::new(0, 1.0, 1.0).validate().is_err());
        assert!(ThresholdPolicy::new(3, -1.0, 1.0).validate().is_err());
        assert!(ThresholdPolicy::new(3, 1.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_misspelled_key_is_an_error() {
        let err = serde_json::from_str::<PerformanceSection>(r#"{"runs": 5}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field `runs`"));
    }

    #[test]
    fn test_empty_section_is_disabled() {
        assert_eq!(section("{}").into_policy(), None);
    }

    #[test]
    fn test_present_section_enables_with_defaults() {
        let policy = section(r#"{"runsPerInstance": 5}"#).into_policy().unwrap();
        assert_eq!(policy.runs_per_instance, 5);
        assert_eq!(policy.relative_threshold_in_percent, 1.0);
        assert_eq!(policy.absolute_threshold_in_seconds, 1.0);
    }

    #[test]
    fn test_enabled_flag_values() {
        for on in [r#""True""#, r#""true""#, r#""1""#, r#""yes""#, "true", "1"] {
            let json = format!(r#"{{"enabled": {}}}"#, on);
            assert_eq!(
                section(&json).into_policy(),
                Some(ThresholdPolicy::default()),
                "{} should enable",
                on
            );
        }
        for off in [r#""false""#, r#""no""#, r#""0""#, "false", "0"] {
            let json = format!(r#"{{"enabled": {}, "runsPerInstance": 2}}"#, off);
            assert_eq!(section(&json).into_policy(), None, "{} should disable", off);
        }
    }

    #[test]
    fn test_thresholds_are_read() {
        let policy = section(
            r#"{"relativeThresholdInPercent": 1.5, "absoluteThresholdInSeconds": 2.3}"#,
        )
        .into_policy()
        .unwrap();
        assert_eq!(policy.relative_threshold_in_percent, 1.5);
        assert_eq!(policy.absolute_threshold_in_seconds, 2.3);
    }
}
