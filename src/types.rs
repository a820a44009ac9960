//! Core types for the Synheart PulseLock engine
//!
//! This module defines the data structures that flow through each stage of the
//! matching pipeline: raw samples, feature vectors, pattern fingerprints,
//! enrollment baselines, lockout state, and the decision surface exposed to
//! callers.

use crate::error::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single heart-rate measurement delivered by the sample source.
///
/// Immutable once created; the engine never fabricates or mutates samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// Measured value (beats per minute)
    pub value_bpm: f64,
    /// When the sample was captured (UTC)
    pub timestamp: DateTime<Utc>,
    /// Originating sensor identifier (e.g. "polar-h10", "apple-watch")
    pub source: String,
    /// Sensor-reported quality (0-1), opaque to the engine
    pub quality: f64,
}

impl HeartRateSample {
    pub fn new(value_bpm: f64, timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            value_bpm,
            timestamp,
            source: source.into(),
            quality: 1.0,
        }
    }
}

/// An ordered capture window of heart-rate samples.
///
/// Insertion order is time order; construction rejects windows whose
/// timestamps decrease. Derived statistics are computed on demand and never
/// stored redundantly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    samples: Vec<HeartRateSample>,
}

impl SampleWindow {
    /// Create a window from time-ordered samples.
    ///
    /// Returns [`AuthError::InvalidWindow`] if any timestamp precedes the one
    /// before it.
    pub fn new(samples: Vec<HeartRateSample>) -> Result<Self, AuthError> {
        for pair in samples.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(AuthError::InvalidWindow(format!(
                    "timestamps decrease at {} -> {}",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        Ok(Self { samples })
    }

    /// An empty window (resolves to insufficient data downstream).
    pub fn empty() -> Self {
        Self { samples: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[HeartRateSample] {
        &self.samples
    }

    /// BPM values in capture order
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value_bpm).collect()
    }

    /// Arithmetic mean of the window (0.0 for an empty window)
    pub fn mean_bpm(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.value_bpm).sum::<f64>() / self.samples.len() as f64
    }

    pub fn min_bpm(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .iter()
            .map(|s| s.value_bpm)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn max_bpm(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .iter()
            .map(|s| s.value_bpm)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Capture duration from first to last sample
    pub fn duration(&self) -> chrono::Duration {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => chrono::Duration::zero(),
        }
    }
}

/// Frequency-domain features from the magnitude spectrum of the series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFeatures {
    /// Strongest non-DC spectral bin, as a percentage of the series length
    pub dominant_frequency: f64,
    /// Magnitude-weighted mean bin index
    pub spectral_centroid: f64,
    /// Magnitude-weighted standard deviation around the centroid
    pub spectral_spread: f64,
    /// Smallest bin at which cumulative squared-magnitude energy reaches 85%
    pub spectral_rolloff: f64,
}

/// Time-domain features of the smoothed series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub mean_amplitude: f64,
    pub peak_to_peak: f64,
    pub rms_value: f64,
    /// Sign changes in the mean-centered series
    pub zero_crossings: u32,
}

/// Statistical moments of the smoothed series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Third standardized moment
    pub skewness: f64,
    /// Excess kurtosis (fourth standardized moment minus 3)
    pub kurtosis: f64,
}

/// Heart-rate variability features over successive differences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariabilityFeatures {
    /// Root mean square of successive differences
    pub rmssd: f64,
    /// Percentage of successive differences exceeding the pNN threshold
    pub pnn50: f64,
    /// (max - min) / median of the series
    pub triangular_index: f64,
    /// Population standard deviation of the series
    pub sdnn: f64,
}

/// Complete feature vector derived from one sample window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub frequency: FrequencyFeatures,
    pub time: TimeFeatures,
    pub statistical: StatisticalFeatures,
    pub variability: VariabilityFeatures,
}

/// The comparable, serializable representation of one captured heart pattern.
///
/// Confidence is computed once at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFingerprint {
    /// Deterministic identifier derived from feature values.
    /// Correlation and logging only - never a security credential.
    pub id: String,
    pub features: FeatureVector,
    /// Creation-time confidence (0-1)
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Security tier controlling the accept threshold and retry allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
    Maximum,
}

impl SecurityLevel {
    /// Minimum accept score on the 0-100 similarity scale
    pub fn threshold(&self) -> f64 {
        match self {
            SecurityLevel::Low => 70.0,
            SecurityLevel::Medium => 80.0,
            SecurityLevel::High => 90.0,
            SecurityLevel::Maximum => 95.0,
        }
    }

    /// Failed attempts allowed per lockout period
    pub fn retry_allowance(&self) -> u32 {
        match self {
            SecurityLevel::Low => 3,
            SecurityLevel::Medium => 2,
            SecurityLevel::High => 1,
            SecurityLevel::Maximum => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Low => "low",
            SecurityLevel::Medium => "medium",
            SecurityLevel::High => "high",
            SecurityLevel::Maximum => "maximum",
        }
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Medium
    }
}

/// The enrolled reference a live capture is compared against.
///
/// Exactly one baseline is active per user; re-enrollment replaces it
/// wholesale and user removal deletes it. No merge semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentBaseline {
    pub user_id: String,
    pub fingerprint: PatternFingerprint,
    pub security_level: SecurityLevel,
    pub enrolled_at: DateTime<Utc>,
}

/// Persistent lockout bookkeeping for one user.
///
/// Invariant: `remaining_attempts = allowance - attempts_in_current_period`,
/// never negative. `current_period_index` only grows; it returns to 0 only on
/// a successful authentication or an administrative reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockoutState {
    /// Escalation step reached so far (0 = no lockout served yet)
    pub current_period_index: u32,
    /// Failed attempts consumed in the current period
    pub attempts_in_current_period: u32,
    /// Attempts left before the next escalation
    pub remaining_attempts: u32,
    pub is_locked_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_reason: Option<String>,
}

impl LockoutState {
    /// Fresh state with the full attempt allowance available
    pub fn new(allowance: u32) -> Self {
        Self {
            current_period_index: 0,
            attempts_in_current_period: 0,
            remaining_attempts: allowance,
            is_locked_out: false,
            lockout_end_time: None,
            lockout_reason: None,
        }
    }
}

/// Outcome kind of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected,
    RetryRequired,
    LockedOut,
    SystemUnavailable,
}

/// Append-only audit record of one attempt.
///
/// The engine keeps the most recent records in memory per user; this log is
/// never authoritative for lockout decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationAttempt {
    pub id: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Wall-clock duration of the attempt (milliseconds)
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Decision surface exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthDecision {
    Accepted {
        similarity: f64,
        confidence: f64,
    },
    Rejected {
        similarity: f64,
    },
    /// Capture was unusable; the caller should recapture and retry
    RetryRequired {
        reason: String,
    },
    LockedOut {
        reason: String,
        /// Seconds until the lockout expires
        retry_after_secs: i64,
    },
    SystemUnavailable {
        reason: String,
    },
}

impl AuthDecision {
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            AuthDecision::Accepted { .. } => AttemptOutcome::Accepted,
            AuthDecision::Rejected { .. } => AttemptOutcome::Rejected,
            AuthDecision::RetryRequired { .. } => AttemptOutcome::RetryRequired,
            AuthDecision::LockedOut { .. } => AttemptOutcome::LockedOut,
            AuthDecision::SystemUnavailable { .. } => AttemptOutcome::SystemUnavailable,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthDecision::Accepted { .. })
    }
}

/// Notification emitted by the engine; callers drain these instead of
/// observing shared mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    AttemptCompleted {
        user_id: String,
        outcome: AttemptOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        similarity: Option<f64>,
    },
    LockoutStarted {
        user_id: String,
        period_index: u32,
        until: DateTime<Utc>,
    },
    LockoutCleared {
        user_id: String,
    },
    BaselineEnrolled {
        user_id: String,
        fingerprint_id: String,
    },
    BaselineRemoved {
        user_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_decreasing_timestamps() {
        let samples = vec![
            HeartRateSample::new(70.0, ts(10), "test"),
            HeartRateSample::new(71.0, ts(5), "test"),
        ];
        assert!(SampleWindow::new(samples).is_err());
    }

    #[test]
    fn test_window_accepts_equal_timestamps() {
        let samples = vec![
            HeartRateSample::new(70.0, ts(0), "test"),
            HeartRateSample::new(71.0, ts(0), "test"),
        ];
        assert!(SampleWindow::new(samples).is_ok());
    }

    #[test]
    fn test_window_derived_stats() {
        let samples = vec![
            HeartRateSample::new(60.0, ts(0), "test"),
            HeartRateSample::new(70.0, ts(1), "test"),
            HeartRateSample::new(80.0, ts(2), "test"),
        ];
        let window = SampleWindow::new(samples).unwrap();

        assert!((window.mean_bpm() - 70.0).abs() < 0.001);
        assert_eq!(window.min_bpm(), 60.0);
        assert_eq!(window.max_bpm(), 80.0);
        assert_eq!(window.duration(), chrono::Duration::seconds(2));
    }

    #[test]
    fn test_empty_window_stats() {
        let window = SampleWindow::empty();
        assert_eq!(window.mean_bpm(), 0.0);
        assert_eq!(window.duration(), chrono::Duration::zero());
    }

    #[test]
    fn test_security_level_tables() {
        assert_eq!(SecurityLevel::Low.threshold(), 70.0);
        assert_eq!(SecurityLevel::Maximum.threshold(), 95.0);
        assert_eq!(SecurityLevel::Low.retry_allowance(), 3);
        assert_eq!(SecurityLevel::High.retry_allowance(), 1);
        assert_eq!(SecurityLevel::default(), SecurityLevel::Medium);
    }

    #[test]
    fn test_lockout_state_new() {
        let state = LockoutState::new(2);
        assert_eq!(state.current_period_index, 0);
        assert_eq!(state.remaining_attempts, 2);
        assert!(!state.is_locked_out);
        assert!(state.lockout_end_time.is_none());
    }

    #[test]
    fn test_decision_outcome_mapping() {
        let accepted = AuthDecision::Accepted {
            similarity: 0.9,
            confidence: 0.8,
        };
        assert_eq!(accepted.outcome(), AttemptOutcome::Accepted);
        assert!(accepted.is_accepted());

        let locked = AuthDecision::LockedOut {
            reason: "too many failures".to_string(),
            retry_after_secs: 600,
        };
        assert_eq!(locked.outcome(), AttemptOutcome::LockedOut);
        assert!(!locked.is_accepted());
    }
}
