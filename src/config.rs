//! Engine configuration
//!
//! All tunables of the matching pipeline and the lockout policy live here so
//! that call sites carry no magic numbers. Defaults match the physiological
//! and policy constants the engine ships with.

use crate::error::AuthError;
use crate::types::SecurityLevel;
use serde::{Deserialize, Serialize};

/// Default minimum number of samples per capture window
pub const DEFAULT_MIN_SAMPLE_COUNT: usize = 100;

/// Default sample count at which data quality saturates
pub const DEFAULT_MAX_SAMPLE_COUNT: usize = 300;

/// Default centered moving-average window for smoothing
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Escalating lockout policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Lockout durations per escalation step (minutes)
    pub escalation_minutes: Vec<i64>,
    /// Duration added per step beyond the explicit table (minutes)
    pub extension_minutes: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            // 10m, 20m, 40m, 90m, 6h, 1d, 48h
            escalation_minutes: vec![10, 20, 40, 90, 360, 1440, 2880],
            extension_minutes: 2880,
        }
    }
}

/// Configuration for [`PulseLockEngine`](crate::engine::PulseLockEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum samples a window must contain to be processed
    pub min_sample_count: usize,
    /// Sample count at which the data-quality term saturates
    pub max_sample_count: usize,
    /// Lower bound of the physiologically plausible band (BPM)
    pub plausible_min_bpm: f64,
    /// Upper bound of the physiologically plausible band (BPM)
    pub plausible_max_bpm: f64,
    /// Minimum fraction of samples that must fall in the plausible band
    pub min_plausible_fraction: f64,
    /// Centered moving-average window used for smoothing
    pub smoothing_window: usize,
    /// Successive-difference threshold for the pNN metric
    pub pnn_threshold: f64,
    /// Minimum fingerprint confidence accepted at enrollment
    pub min_enrollment_confidence: f64,
    /// Security level applied to new enrollments
    pub security_level: SecurityLevel,
    pub lockout: LockoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample_count: DEFAULT_MIN_SAMPLE_COUNT,
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            plausible_min_bpm: 40.0,
            plausible_max_bpm: 200.0,
            min_plausible_fraction: 0.8,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            pnn_threshold: 50.0,
            min_enrollment_confidence: 0.5,
            security_level: SecurityLevel::Medium,
            lockout: LockoutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate internal consistency of the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.min_sample_count == 0 {
            return Err(AuthError::InvalidConfig(
                "min_sample_count must be positive".to_string(),
            ));
        }
        if self.max_sample_count < self.min_sample_count {
            return Err(AuthError::InvalidConfig(format!(
                "max_sample_count {} below min_sample_count {}",
                self.max_sample_count, self.min_sample_count
            )));
        }
        if self.plausible_min_bpm >= self.plausible_max_bpm {
            return Err(AuthError::InvalidConfig(format!(
                "plausible band is empty: [{}, {}]",
                self.plausible_min_bpm, self.plausible_max_bpm
            )));
        }
        if !(0.0..=1.0).contains(&self.min_plausible_fraction) {
            return Err(AuthError::InvalidConfig(
                "min_plausible_fraction must be within [0, 1]".to_string(),
            ));
        }
        if self.smoothing_window == 0 {
            return Err(AuthError::InvalidConfig(
                "smoothing_window must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_enrollment_confidence) {
            return Err(AuthError::InvalidConfig(
                "min_enrollment_confidence must be within [0, 1]".to_string(),
            ));
        }
        if self.lockout.escalation_minutes.is_empty() {
            return Err(AuthError::InvalidConfig(
                "lockout escalation table must not be empty".to_string(),
            ));
        }
        if self.lockout.extension_minutes <= 0 {
            return Err(AuthError::InvalidConfig(
                "lockout extension_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
