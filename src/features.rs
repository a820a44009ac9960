//! Feature extraction
//!
//! This module turns a validated sample window into a [`FeatureVector`]:
//! - Preprocessing: IQR outlier removal, then centered moving-average smoothing
//! - Frequency features from the magnitude spectrum of the centered series
//! - Time-domain, statistical-moment, and variability (HRV) features
//!
//! Every formula clamps degenerate inputs (empty series, zero variance, zero
//! magnitudes) to 0.0; no NaN or infinity ever leaves this module.

use crate::config::EngineConfig;
use crate::types::{
    FeatureVector, FrequencyFeatures, SampleWindow, StatisticalFeatures, TimeFeatures,
    VariabilityFeatures,
};

/// Multiplier on the interquartile range for outlier fences
const IQR_FENCE_FACTOR: f64 = 1.5;

/// Fraction of spectral energy at which rolloff is measured
const ROLLOFF_ENERGY_FRACTION: f64 = 0.85;

/// Extractor for deriving feature vectors from sample windows
pub struct FeatureExtractor {
    smoothing_window: usize,
    pnn_threshold: f64,
}

impl FeatureExtractor {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            smoothing_window: config.smoothing_window,
            pnn_threshold: config.pnn_threshold,
        }
    }

    /// Preprocess the window and derive all four feature groups
    pub fn extract(&self, window: &SampleWindow) -> FeatureVector {
        let filtered = remove_outliers(&window.values());
        let smoothed = moving_average(&filtered, self.smoothing_window);

        if smoothed.is_empty() {
            return FeatureVector::default();
        }

        FeatureVector {
            frequency: compute_frequency_features(&smoothed),
            time: compute_time_features(&smoothed),
            statistical: compute_statistical_features(&smoothed),
            variability: compute_variability_features(&smoothed, self.pnn_threshold),
        }
    }
}

/// Discard values outside `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    if values.len() < 4 {
        return values.to_vec();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - IQR_FENCE_FACTOR * iqr;
    let upper = q3 + IQR_FENCE_FACTOR * iqr;

    values
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect()
}

/// Centered moving average; edge positions use a shrunk window
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.is_empty() || window <= 1 {
        return values.to_vec();
    }

    let half = window / 2;
    let n = values.len();
    let mut smoothed = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        let sum: f64 = values[start..end].iter().sum();
        smoothed.push(sum / (end - start) as f64);
    }

    smoothed
}

/// Linear-interpolated quantile over a sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Magnitude spectrum of the mean-centered series over bins `1..=n/2`.
///
/// The DC bin is excluded so a constant series carries no dominant frequency.
/// Returns `(bin_index, magnitude)` pairs.
fn magnitude_spectrum(values: &[f64]) -> Vec<(usize, f64)> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();

    let mut spectrum = Vec::with_capacity(n / 2);
    for k in 1..=(n / 2) {
        let mut real = 0.0;
        let mut imag = 0.0;
        for (j, x) in centered.iter().enumerate() {
            let angle = 2.0 * std::f64::consts::PI * (k * j) as f64 / n as f64;
            real += x * angle.cos();
            imag -= x * angle.sin();
        }
        spectrum.push((k, (real * real + imag * imag).sqrt()));
    }
    spectrum
}

/// Frequency-group features from the magnitude spectrum
pub fn compute_frequency_features(values: &[f64]) -> FrequencyFeatures {
    let spectrum = magnitude_spectrum(values);
    let total_magnitude: f64 = spectrum.iter().map(|(_, m)| m).sum();

    if spectrum.is_empty() || total_magnitude <= 0.0 {
        return FrequencyFeatures::default();
    }

    let n = values.len() as f64;

    // Dominant bin, normalized to a percentage of the series length
    let (dominant_bin, _) = spectrum
        .iter()
        .fold((0usize, f64::NEG_INFINITY), |(best_k, best_m), (k, m)| {
            if *m > best_m {
                (*k, *m)
            } else {
                (best_k, best_m)
            }
        });
    let dominant_frequency = dominant_bin as f64 / n * 100.0;

    // Magnitude-weighted mean bin and spread around it
    let spectral_centroid = spectrum
        .iter()
        .map(|(k, m)| *k as f64 * m)
        .sum::<f64>()
        / total_magnitude;
    let spectral_spread = (spectrum
        .iter()
        .map(|(k, m)| m * (*k as f64 - spectral_centroid).powi(2))
        .sum::<f64>()
        / total_magnitude)
        .sqrt();

    // Smallest bin at which cumulative squared-magnitude energy reaches 85%
    let total_energy: f64 = spectrum.iter().map(|(_, m)| m * m).sum();
    let mut cumulative = 0.0;
    let mut spectral_rolloff = 0.0;
    for (k, m) in &spectrum {
        cumulative += m * m;
        if cumulative >= ROLLOFF_ENERGY_FRACTION * total_energy {
            spectral_rolloff = *k as f64;
            break;
        }
    }

    FrequencyFeatures {
        dominant_frequency,
        spectral_centroid,
        spectral_spread,
        spectral_rolloff,
    }
}

/// Time-group features of the series
pub fn compute_time_features(values: &[f64]) -> TimeFeatures {
    if values.is_empty() {
        return TimeFeatures::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let rms = (values.iter().map(|v| v * v).sum::<f64>() / n).sqrt();

    let mut zero_crossings = 0u32;
    for pair in values.windows(2) {
        if (pair[0] - mean) * (pair[1] - mean) < 0.0 {
            zero_crossings += 1;
        }
    }

    TimeFeatures {
        mean_amplitude: mean,
        peak_to_peak: max - min,
        rms_value: rms,
        zero_crossings,
    }
}

/// Statistical-group features: mean, population variance, standardized moments
pub fn compute_statistical_features(values: &[f64]) -> StatisticalFeatures {
    if values.is_empty() {
        return StatisticalFeatures::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    // Identical samples have zero spread; both moments clamp to 0
    let (skewness, kurtosis) = if std_dev > 0.0 {
        let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
        let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
        (m3 / std_dev.powi(3), m4 / variance.powi(2) - 3.0)
    } else {
        (0.0, 0.0)
    };

    StatisticalFeatures {
        mean,
        variance,
        skewness,
        kurtosis,
    }
}

/// Variability-group (HRV) features over successive absolute differences
pub fn compute_variability_features(values: &[f64], pnn_threshold: f64) -> VariabilityFeatures {
    if values.is_empty() {
        return VariabilityFeatures::default();
    }

    let diffs: Vec<f64> = values.windows(2).map(|p| (p[1] - p[0]).abs()).collect();

    let rmssd = if diffs.is_empty() {
        0.0
    } else {
        (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt()
    };

    let pnn50 = if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().filter(|d| **d > pnn_threshold).count() as f64 / diffs.len() as f64 * 100.0
    };

    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let med = median(values);
    let triangular_index = if med != 0.0 { (max - min) / med } else { 0.0 };

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sdnn = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    VariabilityFeatures {
        rmssd,
        pnn50,
        triangular_index,
        sdnn,
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
