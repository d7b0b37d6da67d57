//! Preprocessing strategies (removal, imputation, capping, transformation)
//!
//! Each strategy is a [`StrategyHandler`]; the workflow executor looks the
//! handler up by [`StrategyKind`], so adding a strategy means registering a
//! new handler rather than editing a central match.

use crate::error::StrategyError;
use dataguard_core::DataPoint;
use dataguard_core::stats;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Step parameters, exactly as carried by a suggestion's implementation plan.
pub type Parameters = serde_json::Map<String, Value>;

// parameter names shared with the advisor
pub const REMOVE_INDICES: &str = "remove_indices";
pub const OUTLIER_INDICES: &str = "outlier_indices";
pub const OUTLIER_COUNT: &str = "outlier_count";
pub const IMPUTATION_METHOD: &str = "method";
pub const FALLBACK_METHOD: &str = "fallback_method";
pub const LOWER_PERCENTILE: &str = "lower_percentile";
pub const UPPER_PERCENTILE: &str = "upper_percentile";
pub const AFFECTED_OUTLIERS: &str = "affected_outliers";
pub const TRANSFORMATION: &str = "transformation";
pub const HANDLE_NEGATIVES: &str = "handle_negatives";

// |z| above which a neighbour is not trusted for interpolation
const NEIGHBOUR_Z_LIMIT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Removal,
    Imputation,
    Capping,
    Transformation,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Removal,
        StrategyKind::Imputation,
        StrategyKind::Capping,
        StrategyKind::Transformation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Removal => "removal",
            StrategyKind::Imputation => "imputation",
            StrategyKind::Capping => "capping",
            StrategyKind::Transformation => "transformation",
        }
    }

    // removal shrinks the series; everything else keeps its length
    pub fn preserves_length(&self) -> bool {
        !matches!(self, StrategyKind::Removal)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "removal" | "remove" => Ok(Self::Removal),
            "imputation" | "impute" => Ok(Self::Imputation),
            "capping" | "cap" | "winsorize" => Ok(Self::Capping),
            "transformation" | "transform" => Ok(Self::Transformation),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// What a handler did to the series.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub series: Vec<DataPoint>,
    pub records_removed: usize,
    pub records_modified: usize,
}

impl StrategyOutcome {
    pub fn records_affected(&self) -> usize {
        self.records_removed + self.records_modified
    }
}

pub trait StrategyHandler: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn apply(&self, series: &[DataPoint], params: &Parameters) -> Result<StrategyOutcome, StrategyError>;
}

// REMOVAL //

pub struct RemovalStrategy;

impl StrategyHandler for RemovalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Removal
    }

    fn apply(&self, series: &[DataPoint], params: &Parameters) -> Result<StrategyOutcome, StrategyError> {
        let remove: BTreeSet<usize> = index_list(params, REMOVE_INDICES)?.into_iter().collect();
        let kept: Vec<DataPoint> = series
            .iter()
            .enumerate()
            .filter(|(i, _)| !remove.contains(i))
            .map(|(_, p)| p.clone())
            .collect();

        Ok(StrategyOutcome {
            records_removed: series.len() - kept.len(),
            records_modified: 0,
            series: kept,
        })
    }
}

// IMPUTATION //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputationMethod {
    Linear,
    Mean,
    Median,
}

impl FromStr for ImputationMethod {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(StrategyError::UnknownImputationMethod(other.to_string())),
        }
    }
}

pub struct ImputationStrategy;

impl StrategyHandler for ImputationStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Imputation
    }

    fn apply(&self, series: &[DataPoint], params: &Parameters) -> Result<StrategyOutcome, StrategyError> {
        let targets: BTreeSet<usize> = index_list(params, OUTLIER_INDICES)?.into_iter().collect();
        let method: ImputationMethod = string_or(params, IMPUTATION_METHOD, "linear")?.parse()?;

        let values = dataguard_core::values(series);
        let imputer = Imputer::new(&values);
        let mut processed = series.to_vec();
        let mut records_modified = 0;

        for index in targets.into_iter().filter(|i| *i < series.len()) {
            let replacement = match method {
                ImputationMethod::Linear => imputer.interpolate(index),
                ImputationMethod::Mean => imputer.mean,
                ImputationMethod::Median => imputer.median,
            };
            processed[index] = series[index].with_value(replacement);
            records_modified += 1;
        }

        Ok(StrategyOutcome {
            series: processed,
            records_removed: 0,
            records_modified,
        })
    }
}

// neighbour search always runs against the unmodified input values
struct Imputer<'a> {
    values: &'a [f64],
    mean: f64,
    std_dev: f64,
    median: f64,
}

impl<'a> Imputer<'a> {
    fn new(values: &'a [f64]) -> Self {
        let mean = stats::mean(values);
        Self {
            values,
            mean,
            std_dev: stats::population_std_dev(values, mean),
            median: stats::median(values),
        }
    }

    fn is_trusted(&self, value: f64) -> bool {
        stats::z_score(value, self.mean, self.std_dev).abs() <= NEIGHBOUR_Z_LIMIT
    }

    fn interpolate(&self, index: usize) -> f64 {
        let prev = (0..index).rev().find(|i| self.is_trusted(self.values[*i]));
        let next = (index + 1..self.values.len()).find(|i| self.is_trusted(self.values[*i]));

        match (prev, next) {
            (Some(p), Some(n)) => {
                let weight = (index - p) as f64 / (n - p) as f64;
                self.values[p] * (1.0 - weight) + self.values[n] * weight
            }
            (Some(p), None) => self.values[p],
            (None, Some(n)) => self.values[n],
            (None, None) => self.median,
        }
    }
}

// CAPPING //

/// Winsorization: clamp to percentile bounds of the current values.
pub struct CappingStrategy;

impl CappingStrategy {
    pub const DEFAULT_LOWER_PERCENTILE: f64 = 5.0;
    pub const DEFAULT_UPPER_PERCENTILE: f64 = 95.0;

    /// Percentile bounds `(lower, upper)` over the given values.
    pub fn bounds(values: &[f64], lower_percentile: f64, upper_percentile: f64) -> (f64, f64) {
        let sorted = stats::sorted_copy(values);
        (
            stats::percentile(&sorted, lower_percentile),
            stats::percentile(&sorted, upper_percentile),
        )
    }
}

impl StrategyHandler for CappingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Capping
    }

    fn apply(&self, series: &[DataPoint], params: &Parameters) -> Result<StrategyOutcome, StrategyError> {
        let lower_pct = number_or(params, LOWER_PERCENTILE, Self::DEFAULT_LOWER_PERCENTILE)?;
        let upper_pct = number_or(params, UPPER_PERCENTILE, Self::DEFAULT_UPPER_PERCENTILE)?;
        if !(0.0..=100.0).contains(&lower_pct) || !(0.0..=100.0).contains(&upper_pct) {
            return Err(StrategyError::InvalidParameter {
                name: LOWER_PERCENTILE,
                reason: format!("percentiles must lie in [0, 100], got {lower_pct} and {upper_pct}"),
            });
        }
        if lower_pct > upper_pct {
            return Err(StrategyError::InvalidParameter {
                name: LOWER_PERCENTILE,
                reason: format!("lower percentile {lower_pct} exceeds upper percentile {upper_pct}"),
            });
        }

        let (lower, upper) = Self::bounds(&dataguard_core::values(series), lower_pct, upper_pct);
        let mut records_modified = 0;
        let processed = series
            .iter()
            .map(|p| {
                if p.value < lower {
                    records_modified += 1;
                    p.with_value(lower)
                } else if p.value > upper {
                    records_modified += 1;
                    p.with_value(upper)
                } else {
                    p.clone()
                }
            })
            .collect();

        Ok(StrategyOutcome {
            series: processed,
            records_removed: 0,
            records_modified,
        })
    }
}

// TRANSFORMATION //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transformation {
    Log1p,
    Sqrt,
    Square,
    // lambda = 0.5 approximation: sqrt for positive values, 0 otherwise
    BoxCox,
}

impl Transformation {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Transformation::Log1p => value.max(0.0).ln_1p(),
            Transformation::Sqrt => value.max(0.0).sqrt(),
            Transformation::Square => value * value,
            Transformation::BoxCox => {
                if value > 0.0 {
                    value.sqrt()
                } else {
                    0.0
                }
            }
        }
    }
}

impl FromStr for Transformation {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log1p" | "log" => Ok(Self::Log1p),
            "sqrt" => Ok(Self::Sqrt),
            "square" => Ok(Self::Square),
            "boxcox" | "box_cox" => Ok(Self::BoxCox),
            other => Err(StrategyError::UnknownTransformation(other.to_string())),
        }
    }
}

pub struct TransformationStrategy;

impl StrategyHandler for TransformationStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Transformation
    }

    fn apply(&self, series: &[DataPoint], params: &Parameters) -> Result<StrategyOutcome, StrategyError> {
        let name = params
            .get(TRANSFORMATION)
            .ok_or(StrategyError::MissingParameter(TRANSFORMATION))?
            .as_str()
            .ok_or_else(|| invalid(TRANSFORMATION, "expected a string"))?;
        let transformation: Transformation = name.parse()?;

        let processed = series
            .iter()
            .map(|p| p.with_value(transformation.apply(p.value)))
            .collect();

        Ok(StrategyOutcome {
            series: processed,
            records_removed: 0,
            records_modified: series.len(),
        })
    }
}

// PARAMETER HELPERS //

fn invalid(name: &'static str, reason: &str) -> StrategyError {
    StrategyError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

fn index_list(params: &Parameters, name: &'static str) -> Result<Vec<usize>, StrategyError> {
    let list = params
        .get(name)
        .ok_or(StrategyError::MissingParameter(name))?
        .as_array()
        .ok_or_else(|| invalid(name, "expected an array of indices"))?;

    list.iter()
        .map(|v| {
            v.as_u64()
                .map(|i| i as usize)
                .ok_or_else(|| invalid(name, "indices must be non-negative integers"))
        })
        .collect()
}

fn number_or(params: &Parameters, name: &'static str, default: f64) -> Result<f64, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| invalid(name, "expected a number")),
    }
}

fn string_or<'a>(params: &'a Parameters, name: &'static str, default: &'a str) -> Result<&'a str, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_str().ok_or_else(|| invalid(name, "expected a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn series(values: &[f64]) -> Vec<DataPoint> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::new(base + Duration::days(i as i64), *v))
            .collect()
    }

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_removal_drops_indices_once() {
        let data = series(&[1.0, 2.0, 3.0, 4.0]);
        let out = RemovalStrategy
            .apply(&data, &params(json!({ "remove_indices": [1, 1, 3, 10] })))
            .unwrap();

        assert_eq!(dataguard_core::values(&out.series), vec![1.0, 3.0]);
        assert_eq!(out.records_removed, 2);
        assert_eq!(out.records_affected(), 2);
    }

    #[test]
    fn test_removal_requires_indices() {
        let err = RemovalStrategy.apply(&series(&[1.0]), &Parameters::new()).unwrap_err();
        assert_eq!(err, StrategyError::MissingParameter(REMOVE_INDICES));

        let err = RemovalStrategy
            .apply(&series(&[1.0]), &params(json!({ "remove_indices": [-1] })))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParameter { .. }));
    }

    #[test]
    fn test_linear_imputation_between_neighbours() {
        let data = series(&[100.0, 105.0, 500.0, 102.0, 98.0, 103.0, 101.0]);
        let out = ImputationStrategy
            .apply(&data, &params(json!({ "outlier_indices": [2], "method": "linear" })))
            .unwrap();

        assert_eq!(out.records_modified, 1);
        assert_eq!(out.series[2].value, 103.5);
        assert_eq!(out.series[2].timestamp, data[2].timestamp);
    }

    #[test]
    fn test_imputation_skips_untrusted_neighbours() {
        // 30 points at 10 with two adjacent spikes; interpolating index 10 must
        // walk past the spike at 11
        let mut values = vec![10.0; 30];
        values[10] = 1000.0;
        values[11] = 1000.0;
        values[12] = 16.0;
        let data = series(&values);
        let out = ImputationStrategy
            .apply(&data, &params(json!({ "outlier_indices": [10] })))
            .unwrap();

        // prev = 9 (10.0), next = 12 (16.0), weight 1/3
        assert!((out.series[10].value - 12.0).abs() < 1e-9);
        assert_eq!(out.series[11].value, 1000.0);
    }

    #[test]
    fn test_imputation_edges_and_median_fallback() {
        let data = series(&[50.0, 1.0, 2.0]);
        let out = ImputationStrategy
            .apply(&data, &params(json!({ "outlier_indices": [0, 7] })))
            .unwrap();
        assert_eq!(out.series[0].value, 1.0);
        assert_eq!(out.records_modified, 1);

        let single = series(&[42.0]);
        let out = ImputationStrategy
            .apply(&single, &params(json!({ "outlier_indices": [0] })))
            .unwrap();
        assert_eq!(out.series[0].value, 42.0);
    }

    #[test]
    fn test_imputation_mean_and_unknown_method() {
        let data = series(&[1.0, 2.0, 9.0]);
        let out = ImputationStrategy
            .apply(&data, &params(json!({ "outlier_indices": [2], "method": "mean" })))
            .unwrap();
        assert_eq!(out.series[2].value, 4.0);

        let err = ImputationStrategy
            .apply(&data, &params(json!({ "outlier_indices": [2], "method": "spline" })))
            .unwrap_err();
        assert_eq!(err, StrategyError::UnknownImputationMethod("spline".to_string()));
    }

    #[test]
    fn test_capping_clamps_to_bounds() {
        let values: Vec<f64> = (0..=20).map(|i| i as f64).collect();
        let data = series(&values);
        let out = CappingStrategy
            .apply(&data, &params(json!({ "lower_percentile": 10, "upper_percentile": 90 })))
            .unwrap();

        // bounds 2.0 and 18.0
        assert_eq!(out.records_modified, 4);
        assert_eq!(out.series[0].value, 2.0);
        assert_eq!(out.series[20].value, 18.0);
        assert_eq!(out.series[10].value, 10.0);
    }

    #[test]
    fn test_capping_rejects_inverted_percentiles() {
        let err = CappingStrategy
            .apply(&series(&[1.0, 2.0]), &params(json!({ "lower_percentile": 95, "upper_percentile": 5 })))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParameter { name: LOWER_PERCENTILE, .. }));
    }

    #[test]
    fn test_transformations() {
        assert_eq!(Transformation::Log1p.apply(-5.0), 0.0);
        assert!((Transformation::Log1p.apply(std::f64::consts::E - 1.0) - 1.0).abs() < 1e-12);
        assert_eq!(Transformation::Sqrt.apply(16.0), 4.0);
        assert_eq!(Transformation::Square.apply(-3.0), 9.0);
        assert_eq!(Transformation::BoxCox.apply(9.0), 3.0);
        assert_eq!(Transformation::BoxCox.apply(-9.0), 0.0);
    }

    #[test]
    fn test_transformation_touches_every_point() {
        let data = series(&[1.0, 4.0, 9.0]);
        let out = TransformationStrategy
            .apply(&data, &params(json!({ "transformation": "sqrt" })))
            .unwrap();
        assert_eq!(dataguard_core::values(&out.series), vec![1.0, 2.0, 3.0]);
        assert_eq!(out.records_modified, 3);

        let err = TransformationStrategy
            .apply(&data, &params(json!({ "transformation": "cube" })))
            .unwrap_err();
        assert_eq!(err, StrategyError::UnknownTransformation("cube".to_string()));
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("Winsorize".parse::<StrategyKind>().unwrap(), StrategyKind::Capping);
        assert_eq!(StrategyKind::Removal.to_string(), "removal");
        assert!("smoothing".parse::<StrategyKind>().is_err());
        assert!(!StrategyKind::Removal.preserves_length());
        assert!(StrategyKind::Imputation.preserves_length());
    }
}
