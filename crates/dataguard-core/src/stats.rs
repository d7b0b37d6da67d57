//! Descriptive statistics shared by detection, preprocessing and validation.
//!
//! Every helper accepts an empty slice and returns a neutral value (0)
//! instead of NaN, so degenerate series never poison downstream scores.

use crate::DataPoint;
use serde::{Deserialize, Serialize};

/// IQR multiplier used for the fixed "chart band" and for outlier counts
/// in [`DataStatistics`].
pub const STANDARD_IQR_MULTIPLIER: f64 = 1.5;

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a precomputed mean.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median; the average of the middle pair for even lengths.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Ascending copy of `values` using IEEE total ordering.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Linearly interpolated percentile of an already sorted slice.
///
/// `percentile` is on the 0..=100 scale; the rank is `p/100 * (n - 1)`.
pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Signed z-score; 0 when the spread is zero.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev > 0.0 {
        (value - mean) / std_dev
    } else {
        0.0
    }
}

/// Quartile fences `[Q1 - m*IQR, Q3 + m*IQR]` together with Q1, Q3 and IQR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    pub fn from_sorted(sorted: &[f64], multiplier: f64) -> Self {
        let q1 = percentile(sorted, 25.0);
        let q3 = percentile(sorted, 75.0);
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Sample skewness `n/((n-1)(n-2)) * sum(((x - mean)/sd)^3)` with the
/// population standard deviation. 0 for fewer than 3 points or zero spread.
pub fn skewness(values: &[f64], mean: f64, std_dev: f64) -> f64 {
    let n = values.len() as f64;
    if std_dev == 0.0 || values.len() < 3 {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| ((v - mean) / std_dev).powi(3)).sum();
    (n / ((n - 1.0) * (n - 2.0))) * sum
}

/// Bias-corrected excess kurtosis. 0 for fewer than 4 points or zero spread.
pub fn excess_kurtosis(values: &[f64], mean: f64, std_dev: f64) -> f64 {
    let n = values.len() as f64;
    if std_dev == 0.0 || values.len() < 4 {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| ((v - mean) / std_dev).powi(4)).sum();
    let kurtosis = (n * (n + 1.0)) / ((n - 1.0) * (n - 2.0) * (n - 3.0)) * sum;
    let correction = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    kurtosis - correction
}

// DATA STATISTICS //

/// Snapshot of a series used to compare it before and after preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64, // population
    pub min: f64,
    pub max: f64,
    pub outlier_count: usize, // 1.5x IQR fences
    pub outlier_percentage: f64,
    pub skewness: f64,
    pub kurtosis: f64, // excess
}

impl DataStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }

        let mean = mean(values);
        let std_dev = population_std_dev(values, mean);
        let sorted = sorted_copy(values);
        let fences = IqrFences::from_sorted(&sorted, STANDARD_IQR_MULTIPLIER);
        let outlier_count = values.iter().filter(|v| !fences.contains(**v)).count();

        Self {
            count: values.len(),
            mean,
            median: median(values),
            std_dev,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            outlier_count,
            outlier_percentage: outlier_count as f64 / values.len() as f64 * 100.0,
            skewness: skewness(values, mean, std_dev),
            kurtosis: excess_kurtosis(values, mean, std_dev),
        }
    }

    pub fn from_points(series: &[DataPoint]) -> Self {
        Self::from_values(&crate::values(series))
    }

    fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            outlier_count: 0,
            outlier_percentage: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
        }
    }
}
