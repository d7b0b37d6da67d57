//! Before/after comparison of a preprocessed series

use crate::config::GuidanceConfig;
use dataguard_core::{DataPoint, DataStatistics};
use serde::{Deserialize, Serialize};
use tracing::debug;

// processed series shorter than this share of the original is a concern
const MIN_RETAINED_FRACTION: f64 = 0.7;
// processed std dev below this share of the original is a concern
const MIN_RETAINED_SPREAD: f64 = 0.5;
// kurtosis reference used by the normality terms
const NORMAL_KURTOSIS: f64 = 3.0;
const SHORT_SERIES_PENALTY_POINTS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Improvements {
    pub outlier_reduction: f64,
    pub variance_reduction: f64,
    pub normality_improvement: f64,
    pub data_quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsComparison {
    pub original: DataStatistics,
    pub processed: DataStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub improvements: Improvements,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub statistics: StatisticsComparison,
}

pub struct Validator {
    min_data_points: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(GuidanceConfig::default().min_data_points_required)
    }
}

impl Validator {
    pub fn new(min_data_points: usize) -> Self {
        Self { min_data_points }
    }

    pub fn validate(&self, original: &[DataPoint], processed: &[DataPoint]) -> ValidationReport {
        let before = DataStatistics::from_points(original);
        let after = DataStatistics::from_points(processed);

        let variance_reduction = if before.std_dev > 0.0 {
            (before.std_dev - after.std_dev) / before.std_dev * 100.0
        } else {
            0.0
        };

        let improvements = Improvements {
            outlier_reduction: before.outlier_percentage - after.outlier_percentage,
            variance_reduction,
            normality_improvement: normality_improvement(&before, &after),
            data_quality_score: quality_score(&after),
        };

        let mut concerns = Vec::new();
        if (processed.len() as f64) < original.len() as f64 * MIN_RETAINED_FRACTION {
            concerns.push(
                "More than 30% of data was removed. Consider using less aggressive preprocessing.".to_string(),
            );
        }
        if after.std_dev < before.std_dev * MIN_RETAINED_SPREAD {
            concerns.push("Variance reduced by more than 50%. Data may be over-smoothed.".to_string());
        }
        if processed.len() < self.min_data_points {
            concerns.push(format!(
                "Dataset now has fewer than {} points. May not be sufficient for reliable forecasting.",
                self.min_data_points
            ));
        }

        let recommendations = recommendations(&improvements);
        let is_valid = concerns.is_empty() && improvements.data_quality_score > 50.0;

        debug!(
            is_valid,
            quality = improvements.data_quality_score,
            concerns = concerns.len(),
            "validated preprocessing result"
        );

        ValidationReport {
            is_valid,
            improvements,
            concerns,
            recommendations,
            statistics: StatisticsComparison {
                original: before,
                processed: after,
            },
        }
    }
}

/// Compare a processed series with its original under the default policy.
pub fn validate_results(original: &[DataPoint], processed: &[DataPoint]) -> ValidationReport {
    Validator::default().validate(original, processed)
}

fn normality_improvement(before: &DataStatistics, after: &DataStatistics) -> f64 {
    let skew = (before.skewness.abs() - after.skewness.abs()).max(0.0);
    let kurt = ((before.kurtosis - NORMAL_KURTOSIS).abs() - (after.kurtosis - NORMAL_KURTOSIS).abs()).max(0.0);
    skew * 30.0 + kurt * 20.0
}

/// 0..=100, penalising outliers, skew, kurtosis and short series.
pub fn quality_score(stats: &DataStatistics) -> f64 {
    let shortfall = SHORT_SERIES_PENALTY_POINTS.saturating_sub(stats.count) as f64;
    let score = 100.0
        - stats.outlier_percentage * 2.0
        - stats.skewness.abs() * 5.0
        - (stats.kurtosis - NORMAL_KURTOSIS).abs() * 3.0
        - shortfall * 2.0;
    score.clamp(0.0, 100.0)
}

fn recommendations(improvements: &Improvements) -> Vec<String> {
    let mut out = Vec::new();
    if improvements.outlier_reduction > 50.0 {
        out.push("Excellent outlier reduction. Data quality significantly improved.".to_string());
    }

    let score = improvements.data_quality_score;
    let advice = if score > 80.0 {
        "Data is now ready for forecasting. Proceed with model training."
    } else if score > 60.0 {
        "Data quality is acceptable. Consider additional preprocessing if needed."
    } else {
        "Data quality could be improved further. Consider additional preprocessing steps."
    };
    out.push(advice.to_string());
    out
}
