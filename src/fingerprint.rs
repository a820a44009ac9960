//! Fingerprint construction
//!
//! Packages a derived [`FeatureVector`] into a [`PatternFingerprint`] with a
//! creation-time confidence score:
//!
//! `confidence = 0.6 * data_quality + 0.4 * feature_consistency`
//!
//! Data quality reflects the size and spread of the capture; feature
//! consistency is the fraction of feature groups whose representative value
//! is non-zero.

use crate::config::EngineConfig;
use crate::types::{FeatureVector, PatternFingerprint, SampleWindow};
use chrono::{DateTime, Utc};

/// Weight of the data-quality term in the confidence score
const DATA_QUALITY_WEIGHT: f64 = 0.6;

/// Weight of the feature-consistency term in the confidence score
const FEATURE_CONSISTENCY_WEIGHT: f64 = 0.4;

/// Standard deviation (BPM) at which the spread term saturates
const SPREAD_SATURATION: f64 = 20.0;

/// Builder for pattern fingerprints
pub struct FingerprintBuilder {
    max_sample_count: usize,
}

impl FingerprintBuilder {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_sample_count: config.max_sample_count,
        }
    }

    /// Build a fingerprint from a validated window and its derived features.
    ///
    /// Confidence is fixed here and never recomputed.
    pub fn build(
        &self,
        window: &SampleWindow,
        features: FeatureVector,
        now: DateTime<Utc>,
    ) -> PatternFingerprint {
        let data_quality = self.data_quality(window, &features);
        let feature_consistency = feature_consistency(&features);
        let confidence = (DATA_QUALITY_WEIGHT * data_quality
            + FEATURE_CONSISTENCY_WEIGHT * feature_consistency)
            .clamp(0.0, 1.0);

        PatternFingerprint {
            id: derive_id(&features),
            features,
            confidence,
            created_at: now,
        }
    }

    /// Capture quality: sample count, spread, and a plausible-resting-mean bonus
    fn data_quality(&self, window: &SampleWindow, features: &FeatureVector) -> f64 {
        let count_term = (window.len() as f64 / self.max_sample_count as f64).min(1.0);
        let spread_term = (features.statistical.variance.sqrt() / SPREAD_SATURATION).min(1.0);
        let mean = features.statistical.mean;
        let mean_term = if (50.0..=150.0).contains(&mean) { 1.0 } else { 0.5 };

        0.4 * count_term + 0.4 * spread_term + 0.2 * mean_term
    }
}

/// Fraction of feature groups whose representative value is non-zero,
/// in quarter steps
fn feature_consistency(features: &FeatureVector) -> f64 {
    let indicators = [
        features.frequency.dominant_frequency > 0.0,
        features.time.mean_amplitude > 0.0,
        features.statistical.variance > 0.0,
        features.variability.rmssd > 0.0,
    ];
    indicators.iter().filter(|present| **present).count() as f64 / indicators.len() as f64
}

/// Deterministic identifier folded from representative feature bits.
/// Correlation and logging only - not cryptographically secure.
fn derive_id(features: &FeatureVector) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut acc = FNV_OFFSET;
    for value in [
        features.frequency.dominant_frequency,
        features.time.mean_amplitude,
        features.statistical.variance,
        features.variability.rmssd,
    ] {
        acc ^= value.to_bits();
        acc = acc.wrapping_mul(FNV_PRIME);
    }
    format!("hp-{:016x}", acc)
}
