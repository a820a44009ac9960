//! Sample window validation
//!
//! A pure predicate gate ahead of the pipeline: windows that are too short or
//! too far outside the physiologically plausible band are rejected before any
//! feature work or storage access happens.

use crate::config::EngineConfig;
use crate::types::SampleWindow;
use serde::{Deserialize, Serialize};

/// Structured reason a window failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationFailure {
    TooFewSamples {
        actual: usize,
        required: usize,
    },
    /// Too many samples outside the plausible BPM band
    ImplausibleRange {
        in_range_fraction: f64,
        required_fraction: f64,
    },
}

impl ValidationFailure {
    pub fn message(&self) -> String {
        match self {
            ValidationFailure::TooFewSamples { actual, required } => {
                format!("window has {} samples, {} required", actual, required)
            }
            ValidationFailure::ImplausibleRange {
                in_range_fraction,
                required_fraction,
            } => format!(
                "only {:.0}% of samples in plausible range, {:.0}% required",
                in_range_fraction * 100.0,
                required_fraction * 100.0
            ),
        }
    }
}

/// Validation result for one window
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Validator for raw sample windows. Pure, no side effects.
pub struct SampleValidator {
    min_sample_count: usize,
    plausible_min_bpm: f64,
    plausible_max_bpm: f64,
    min_plausible_fraction: f64,
}

impl SampleValidator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_sample_count: config.min_sample_count,
            plausible_min_bpm: config.plausible_min_bpm,
            plausible_max_bpm: config.plausible_max_bpm,
            min_plausible_fraction: config.min_plausible_fraction,
        }
    }

    /// Check a window against the count floor and the plausible-band fraction
    pub fn validate(&self, window: &SampleWindow) -> ValidationOutcome {
        if window.len() < self.min_sample_count {
            return ValidationOutcome::Invalid(ValidationFailure::TooFewSamples {
                actual: window.len(),
                required: self.min_sample_count,
            });
        }

        let in_range = window
            .samples()
            .iter()
            .filter(|s| {
                s.value_bpm >= self.plausible_min_bpm && s.value_bpm <= self.plausible_max_bpm
            })
            .count();
        let in_range_fraction = in_range as f64 / window.len() as f64;

        if in_range_fraction < self.min_plausible_fraction {
            return ValidationOutcome::Invalid(ValidationFailure::ImplausibleRange {
                in_range_fraction,
                required_fraction: self.min_plausible_fraction,
            });
        }

        ValidationOutcome::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeartRateSample;
    use chrono::{TimeZone, Utc};

    fn make_window(values: &[f64]) -> SampleWindow {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &v)| HeartRateSample::new(v, base + chrono::Duration::seconds(i as i64), "test"))
            .collect();
        SampleWindow::new(samples).unwrap()
    }

    fn make_validator() -> SampleValidator {
        SampleValidator::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_valid_window() {
        let values: Vec<f64> = (0..120).map(|i| 70.0 + (i % 5) as f64).collect();
        let outcome = make_validator().validate(&make_window(&values));
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_too_few_samples() {
        let values: Vec<f64> = (0..50).map(|_| 70.0).collect();
        let outcome = make_validator().validate(&make_window(&values));
        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(ValidationFailure::TooFewSamples {
                actual: 50,
                required: 100,
            })
        );
    }

    #[test]
    fn test_empty_window_rejected() {
        let outcome = make_validator().validate(&SampleWindow::empty());
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_implausible_range() {
        // Half the samples sit far outside the 40-200 BPM band
        let values: Vec<f64> = (0..120)
            .map(|i| if i % 2 == 0 { 70.0 } else { 300.0 })
            .collect();
        let outcome = make_validator().validate(&make_window(&values));
        match outcome {
            ValidationOutcome::Invalid(ValidationFailure::ImplausibleRange {
                in_range_fraction,
                ..
            }) => {
                assert!((in_range_fraction - 0.5).abs() < 0.001);
            }
            other => panic!("expected implausible range, got {:?}", other),
        }
    }

    #[test]
    fn test_boundary_values_count_as_plausible() {
        let mut values: Vec<f64> = (0..118).map(|_| 70.0).collect();
        values.push(40.0);
        values.push(200.0);
        let outcome = make_validator().validate(&make_window(&values));
        assert!(outcome.is_valid());
    }
}
