//! Preprocessing advisor - turns a detection result into ranked suggestions
//!
//! Both generators share [`score_strategy`]; they differ only in the
//! [`ScoringPreset`] carried by the policy:
//! - `Simple`: fixed applicability per strategy
//! - `PolicyDriven`: applicability derived from the outlier profile

use crate::config::{GuidanceConfig, ScoringPreset};
use crate::detection::DetectionResult;
use crate::strategy::{self, Parameters, StrategyKind};
use crate::validation::{ValidationReport, Validator};
use crate::workflow::{self, StepExecutor, StepResult, Workflow, WorkflowStep};
use dataguard_core::DataPoint;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

// outlier percentage above which transformation is offered
const TRANSFORMATION_MIN_PERCENTAGE: f64 = 10.0;
// the simple preset offers removal strictly below this percentage
const SIMPLE_REMOVAL_MAX_PERCENTAGE: f64 = 5.0;

/// How to carry out a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub method: String,
    pub parameters: Parameters,
    pub expected_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    pub title: String,
    pub description: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub applicability: f64, // in [0, 1]
    pub implementation: Implementation,
}

/// The parts of a detection result that drive scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierProfile {
    pub total_points: usize,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub extreme_count: usize, // critical + high
}

impl OutlierProfile {
    pub fn from_result(result: &DetectionResult) -> Self {
        Self {
            total_points: result.statistics.total_points,
            outlier_count: result.statistics.outlier_count,
            outlier_percentage: result.statistics.outlier_percentage,
            extreme_count: result.statistics.severity_breakdown.extreme(),
        }
    }

    pub fn extreme_percentage(&self) -> f64 {
        if self.total_points == 0 {
            0.0
        } else {
            self.extreme_count as f64 / self.total_points as f64 * 100.0
        }
    }
}

/// Applicability of `kind` for this profile, or `None` when the strategy
/// should not be offered at all.
pub fn score_strategy(kind: StrategyKind, profile: &OutlierProfile, policy: &GuidanceConfig) -> Option<f64> {
    let pct = profile.outlier_percentage;
    match policy.scoring {
        ScoringPreset::Simple => match kind {
            StrategyKind::Removal => (pct < SIMPLE_REMOVAL_MAX_PERCENTAGE).then_some(0.8),
            StrategyKind::Imputation => Some(0.7),
            StrategyKind::Capping => (profile.extreme_count > 0).then_some(0.75),
            StrategyKind::Transformation => (pct > TRANSFORMATION_MIN_PERCENTAGE).then_some(0.65),
        },
        ScoringPreset::PolicyDriven => match kind {
            StrategyKind::Removal => {
                (pct <= policy.max_outlier_percentage_for_removal).then(|| removal_score(pct))
            }
            StrategyKind::Imputation => Some(imputation_score(pct)),
            StrategyKind::Capping => {
                (profile.extreme_count > 0).then(|| capping_score(profile.extreme_percentage()))
            }
            StrategyKind::Transformation => {
                (pct > TRANSFORMATION_MIN_PERCENTAGE).then(|| transformation_score(pct))
            }
        },
    }
}

fn removal_score(pct: f64) -> f64 {
    match pct {
        p if p < 2.0 => 0.9,
        p if p < 5.0 => 0.7,
        p if p < 10.0 => 0.4,
        _ => 0.2,
    }
}

fn imputation_score(pct: f64) -> f64 {
    match pct {
        p if p < 10.0 => 0.8,
        p if p < 20.0 => 0.6,
        _ => 0.4,
    }
}

fn capping_score(extreme_pct: f64) -> f64 {
    match extreme_pct {
        p if p > 5.0 => 0.9,
        p if p > 2.0 => 0.75,
        _ => 0.6,
    }
}

fn transformation_score(pct: f64) -> f64 {
    match pct {
        p if p > 20.0 => 0.8,
        p if p > 15.0 => 0.65,
        p if p > 10.0 => 0.5,
        _ => 0.3,
    }
}

/// Build, score and rank suggestions under `policy`.
/// Sorted by descending applicability, ties by the policy's preferred order.
pub fn build_suggestions(
    result: &DetectionResult,
    series_len: usize,
    policy: &GuidanceConfig,
) -> Vec<PreprocessingSuggestion> {
    let profile = OutlierProfile::from_result(result);

    let mut suggestions: Vec<PreprocessingSuggestion> = StrategyKind::ALL
        .iter()
        .filter_map(|kind| {
            score_strategy(*kind, &profile, policy)
                .map(|score| describe(*kind, score.clamp(0.0, 1.0), result, series_len, policy))
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.applicability
            .total_cmp(&a.applicability)
            .then_with(|| policy.preference_rank(a.kind).cmp(&policy.preference_rank(b.kind)))
    });

    debug!(
        preset = ?policy.scoring,
        offered = suggestions.len(),
        outlier_percentage = profile.outlier_percentage,
        "preprocessing suggestions ranked"
    );

    suggestions
}

/// Fixed-literal suggestions for a detection result.
pub fn suggest_preprocessing(result: &DetectionResult) -> Vec<PreprocessingSuggestion> {
    build_suggestions(result, result.statistics.total_points, &GuidanceConfig::simple())
}

/// Policy-driven suggestions with the default guidance policy.
pub fn generate_suggestions(result: &DetectionResult, series: &[DataPoint]) -> Vec<PreprocessingSuggestion> {
    PreprocessingAdvisor::default().generate_suggestions(result, series)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn params(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        _ => Parameters::new(),
    }
}

// 1 -> "1st", 95 -> "95th", 2.5 -> "2.5th"
fn ordinal(value: f64) -> String {
    if value.fract() != 0.0 || value < 0.0 {
        return format!("{value}th");
    }
    let n = value as u64;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn describe(
    kind: StrategyKind,
    applicability: f64,
    result: &DetectionResult,
    series_len: usize,
    policy: &GuidanceConfig,
) -> PreprocessingSuggestion {
    let stats = &result.statistics;
    let indices = result.outlier_indices();

    let (title, description, pros, cons, implementation) = match kind {
        StrategyKind::Removal => (
            "Remove Outlier Data Points",
            format!(
                "Remove {} detected outlier points from the dataset. This is recommended when outliers represent data errors or anomalies.",
                stats.outlier_count
            ),
            strings(&[
                "Simple and straightforward approach",
                "Completely eliminates problematic data points",
                "Improves model stability and reduces noise",
                "Prevents outliers from skewing analysis results",
            ]),
            vec![
                "Permanent loss of potentially valid data".to_string(),
                format!("Reduces dataset size by {:.1}%", stats.outlier_percentage),
                "May remove important extreme events or rare occurrences".to_string(),
                "Could introduce bias if outliers are legitimate values".to_string(),
            ],
            Implementation {
                method: "filter".to_string(),
                parameters: params(json!({
                    (strategy::REMOVE_INDICES): indices,
                    (strategy::OUTLIER_COUNT): stats.outlier_count,
                })),
                expected_outcome: format!(
                    "Dataset will be reduced from {} to {} points ({:.1}% reduction)",
                    series_len,
                    series_len.saturating_sub(stats.outlier_count),
                    stats.outlier_percentage
                ),
            },
        ),
        StrategyKind::Imputation => (
            "Replace Outliers with Interpolated Values",
            format!(
                "Replace {} outliers with statistically derived values using interpolation or mean/median substitution.",
                stats.outlier_count
            ),
            strings(&[
                "Preserves dataset size and structure",
                "Maintains temporal continuity in time series",
                "Less aggressive than complete removal",
                "Reduces impact of extreme values while keeping data points",
            ]),
            strings(&[
                "May introduce artificial patterns or smoothing",
                "Reduces natural data variance and volatility",
                "Requires careful selection of imputation method",
                "Could mask legitimate extreme events",
            ]),
            Implementation {
                method: "interpolation".to_string(),
                parameters: params(json!({
                    (strategy::IMPUTATION_METHOD): "linear",
                    (strategy::OUTLIER_INDICES): indices,
                    (strategy::FALLBACK_METHOD): "median",
                })),
                expected_outcome: format!(
                    "{} outlier values will be replaced with interpolated values based on surrounding data points",
                    stats.outlier_count
                ),
            },
        ),
        StrategyKind::Capping => {
            let (lower, upper) = policy.aggressiveness.to_capping_percentiles();
            let extreme = stats.severity_breakdown.extreme();
            (
                "Cap Extreme Values (Winsorization)",
                format!(
                    "Limit outlier values to threshold boundaries. {} extreme outliers will be capped to acceptable ranges.",
                    extreme
                ),
                strings(&[
                    "Preserves all data points in the dataset",
                    "Reduces impact of extreme values on analysis",
                    "Maintains overall dataset structure and size",
                    "Balances between removal and keeping original data",
                ]),
                strings(&[
                    "Distorts the original data distribution",
                    "May hide important signals or trends",
                    "Threshold selection can be somewhat arbitrary",
                    "Changes the actual values in the dataset",
                ]),
                Implementation {
                    method: "winsorize".to_string(),
                    parameters: params(json!({
                        (strategy::LOWER_PERCENTILE): lower,
                        (strategy::UPPER_PERCENTILE): upper,
                        (strategy::AFFECTED_OUTLIERS): extreme,
                    })),
                    expected_outcome: format!(
                        "Values below the {} percentile and above the {} percentile will be capped to those thresholds",
                        ordinal(lower),
                        ordinal(upper)
                    ),
                },
            )
        }
        StrategyKind::Transformation => (
            "Apply Mathematical Transformation",
            "Transform data using logarithmic or other mathematical functions to reduce outlier impact. Recommended when outliers represent natural data skewness.".to_string(),
            strings(&[
                "Preserves all original data points",
                "Can normalize skewed distributions",
                "Reduces impact of outliers naturally",
                "Often improves model performance",
            ]),
            strings(&[
                "Changes the scale and interpretation of data",
                "May complicate result interpretation",
                "Requires inverse transformation for forecasts",
                "Not suitable for all data types",
            ]),
            Implementation {
                method: "log_transform".to_string(),
                parameters: params(json!({
                    (strategy::TRANSFORMATION): "log1p",
                    (strategy::HANDLE_NEGATIVES): true,
                })),
                expected_outcome: "Data will be log-transformed to reduce skewness and outlier impact".to_string(),
            },
        ),
    };

    PreprocessingSuggestion {
        id: kind.as_str().to_string(),
        kind,
        title: title.to_string(),
        description,
        pros,
        cons,
        applicability,
        implementation,
    }
}

// ADVISOR //

/// Policy-carrying entry point for the whole guidance pipeline:
/// suggest -> build workflow -> execute steps -> validate.
#[derive(Default)]
pub struct PreprocessingAdvisor {
    config: GuidanceConfig,
    executor: StepExecutor,
}

impl PreprocessingAdvisor {
    pub fn new(config: GuidanceConfig) -> Self {
        Self {
            config,
            executor: StepExecutor::default(),
        }
    }

    // swap in a custom handler registry
    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    pub fn generate_suggestions(&self, result: &DetectionResult, series: &[DataPoint]) -> Vec<PreprocessingSuggestion> {
        build_suggestions(result, series.len(), &self.config)
    }

    pub fn create_workflow(
        &self,
        suggestions: &[PreprocessingSuggestion],
        series: &[DataPoint],
        result: &DetectionResult,
    ) -> Workflow {
        workflow::create_workflow(suggestions, series, result)
    }

    pub fn execute_step(&self, step: &mut WorkflowStep, series: &[DataPoint]) -> StepResult {
        self.executor.execute(step, series)
    }

    pub fn validate_results(&self, original: &[DataPoint], processed: &[DataPoint]) -> ValidationReport {
        Validator::new(self.config.min_data_points_required).validate(original, processed)
    }
}
