//! Fingerprint similarity scoring
//!
//! Compares a candidate fingerprint against an enrolled baseline:
//! - Per-field similarity `1 - |a-b| / max(|a|,|b|)`, clamped to [0,1]
//! - Group similarity = mean of its field similarities
//! - Weighted overall score across the four groups
//! - Temporal-stability multiplier from the fingerprints' creation delta
//!
//! When both field magnitudes are exactly zero the pair scores 1.0.

use crate::types::{FeatureVector, PatternFingerprint};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Group weights; sum to 1.0
pub const FREQUENCY_WEIGHT: f64 = 0.30;
pub const TIME_WEIGHT: f64 = 0.25;
pub const STATISTICAL_WEIGHT: f64 = 0.25;
pub const VARIABILITY_WEIGHT: f64 = 0.20;

/// Multiplier when the two captures are less than a minute apart
/// (likely artifacts of the same instant)
const SAME_INSTANT_MULTIPLIER: f64 = 0.8;

/// Multiplier when the captures are more than a week apart
/// (natural drift expected)
const DRIFT_MULTIPLIER: f64 = 0.9;

/// Breakdown of one similarity comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    /// Final similarity in [0,1] after the temporal multiplier
    pub overall: f64,
    pub frequency: f64,
    pub time: f64,
    pub statistical: f64,
    pub variability: f64,
    pub temporal_multiplier: f64,
}

/// Scorer comparing candidate fingerprints against a baseline
pub struct SimilarityScorer;

impl SimilarityScorer {
    /// Score `candidate` against `baseline`. Symmetric in its arguments.
    pub fn score(candidate: &PatternFingerprint, baseline: &PatternFingerprint) -> SimilarityScore {
        let frequency = frequency_similarity(&candidate.features, &baseline.features);
        let time = time_similarity(&candidate.features, &baseline.features);
        let statistical = statistical_similarity(&candidate.features, &baseline.features);
        let variability = variability_similarity(&candidate.features, &baseline.features);

        let weighted = FREQUENCY_WEIGHT * frequency
            + TIME_WEIGHT * time
            + STATISTICAL_WEIGHT * statistical
            + VARIABILITY_WEIGHT * variability;

        let elapsed = candidate.created_at - baseline.created_at;
        let temporal_multiplier = temporal_multiplier(elapsed);

        SimilarityScore {
            overall: (weighted * temporal_multiplier).clamp(0.0, 1.0),
            frequency,
            time,
            statistical,
            variability,
            temporal_multiplier,
        }
    }
}

/// Relative-difference similarity for one field pair.
///
/// The denominator uses absolute magnitudes so signed moments (skewness,
/// excess kurtosis) cannot yield a negative divisor; for non-negative fields
/// this is identical to `max(a,b)`. Both-zero pairs score 1.0.
pub fn field_similarity(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom == 0.0 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / denom).clamp(0.0, 1.0)
}

fn frequency_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    mean4(
        field_similarity(a.frequency.dominant_frequency, b.frequency.dominant_frequency),
        field_similarity(a.frequency.spectral_centroid, b.frequency.spectral_centroid),
        field_similarity(a.frequency.spectral_spread, b.frequency.spectral_spread),
        field_similarity(a.frequency.spectral_rolloff, b.frequency.spectral_rolloff),
    )
}

fn time_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    mean4(
        field_similarity(a.time.mean_amplitude, b.time.mean_amplitude),
        field_similarity(a.time.peak_to_peak, b.time.peak_to_peak),
        field_similarity(a.time.rms_value, b.time.rms_value),
        field_similarity(a.time.zero_crossings as f64, b.time.zero_crossings as f64),
    )
}

fn statistical_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    mean4(
        field_similarity(a.statistical.mean, b.statistical.mean),
        field_similarity(a.statistical.variance, b.statistical.variance),
        field_similarity(a.statistical.skewness, b.statistical.skewness),
        field_similarity(a.statistical.kurtosis, b.statistical.kurtosis),
    )
}

fn variability_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    mean4(
        field_similarity(a.variability.rmssd, b.variability.rmssd),
        field_similarity(a.variability.pnn50, b.variability.pnn50),
        field_similarity(a.variability.triangular_index, b.variability.triangular_index),
        field_similarity(a.variability.sdnn, b.variability.sdnn),
    )
}

fn mean4(a: f64, b: f64, c: f64, d: f64) -> f64 {
    (a + b + c + d) / 4.0
}

/// Stability multiplier from the elapsed time between the two captures
pub fn temporal_multiplier(elapsed: Duration) -> f64 {
    let elapsed = if elapsed < Duration::zero() { -elapsed } else { elapsed };
    if elapsed < Duration::seconds(60) {
        SAME_INSTANT_MULTIPLIER
    } else if elapsed > Duration::days(7) {
        DRIFT_MULTIPLIER
    } else {
        1.0
    }
}
