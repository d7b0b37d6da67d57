//! Configuration for outlier detection and preprocessing guidance

use crate::error::ConfigError;
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Main config structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataGuardConfig {
    // how detection runs when the caller does not say otherwise
    #[serde(default)]
    pub detection: DetectionConfig,

    // advisor / validator policy
    #[serde(default)]
    pub guidance: GuidanceConfig,
}

// Detection algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    #[default]
    Iqr,
    #[serde(rename = "zscore", alias = "z_score")]
    ZScore,
    // nearest-neighbour distance score; not a real isolation forest
    #[serde(alias = "isolation_forest")]
    IsolationHeuristic,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Iqr => "iqr",
            DetectionMethod::ZScore => "zscore",
            DetectionMethod::IsolationHeuristic => "isolation_heuristic",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low, // wider bounds, fewer outliers
    #[default]
    Medium, // balanced
    High, // tighter bounds, more outliers
}

impl Sensitivity {
    // IQR fence multiplier
    pub fn to_iqr_multiplier(&self) -> f64 {
        match self {
            Sensitivity::Low => 3.0,
            Sensitivity::Medium => 1.5,
            Sensitivity::High => 1.0,
        }
    }

    // |z| above which a point is flagged
    pub fn to_z_threshold(&self) -> f64 {
        match self {
            Sensitivity::Low => 3.5,
            Sensitivity::Medium => 3.0,
            Sensitivity::High => 2.5,
        }
    }

    // normalised isolation score above which a point is flagged
    pub fn to_isolation_threshold(&self) -> f64 {
        match self {
            Sensitivity::Low => 0.7,
            Sensitivity::Medium => 0.6,
            Sensitivity::High => 0.5,
        }
    }
}

/// Detection method, sensitivity and an optional explicit threshold.
///
/// For the IQR method an explicit threshold replaces the fence multiplier;
/// for the other methods it replaces the score cut-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub method: DetectionMethod,

    #[serde(default)]
    pub sensitivity: Sensitivity,

    #[serde(default)]
    pub threshold: Option<f64>,
}

impl DetectionConfig {
    pub fn new(method: DetectionMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    // threshold (or multiplier for IQR) actually applied
    pub fn resolved_cutoff(&self) -> f64 {
        if let Some(t) = self.threshold {
            return t;
        }
        match self.method {
            DetectionMethod::Iqr => self.sensitivity.to_iqr_multiplier(),
            DetectionMethod::ZScore => self.sensitivity.to_z_threshold(),
            DetectionMethod::IsolationHeuristic => self.sensitivity.to_isolation_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggressiveness {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl Aggressiveness {
    // (lower, upper) winsorization percentiles suggested for capping
    pub fn to_capping_percentiles(&self) -> (f64, f64) {
        match self {
            Aggressiveness::Conservative => (1.0, 99.0),
            Aggressiveness::Moderate => (5.0, 95.0),
            Aggressiveness::Aggressive => (10.0, 90.0),
        }
    }
}

/// Which applicability formula the advisor uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPreset {
    // fixed literals per strategy
    Simple,
    // scores derived from the outlier profile
    #[default]
    PolicyDriven,
}

// Advisor and validator policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    // removal is only offered up to this outlier percentage
    pub max_outlier_percentage_for_removal: f64,

    // validation raises a concern below this many points
    pub min_data_points_required: usize,

    // tie-break order for equally applicable strategies
    pub preferred_methods: Vec<StrategyKind>,

    pub aggressiveness: Aggressiveness,

    pub scoring: ScoringPreset,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            max_outlier_percentage_for_removal: 5.0,
            min_data_points_required: 30,
            preferred_methods: vec![
                StrategyKind::Capping,
                StrategyKind::Imputation,
                StrategyKind::Removal,
                StrategyKind::Transformation,
            ],
            aggressiveness: Aggressiveness::Moderate,
            scoring: ScoringPreset::PolicyDriven,
        }
    }
}

impl GuidanceConfig {
    // fixed-literal preset used by `suggest_preprocessing`
    pub fn simple() -> Self {
        Self {
            scoring: ScoringPreset::Simple,
            ..Self::default()
        }
    }

    // position of a strategy in the preference list (unlisted go last)
    pub fn preference_rank(&self, kind: StrategyKind) -> usize {
        self.preferred_methods
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.preferred_methods.len())
    }
}

// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DataGuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<DataGuardConfig, ConfigError> {
    let config: DataGuardConfig = toml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let toml_content = r#"
[detection]
method = "zscore"
sensitivity = "high"

[guidance]
max_outlier_percentage_for_removal = 8.0
min_data_points_required = 50
preferred_methods = ["imputation", "removal"]
aggressiveness = "conservative"
scoring = "simple"
"#;
        let config = parse_config(toml_content).unwrap();
        assert_eq!(config.detection.method, DetectionMethod::ZScore);
        assert_eq!(config.detection.sensitivity, Sensitivity::High);
        assert_eq!(config.detection.threshold, None);
        assert_eq!(config.guidance.max_outlier_percentage_for_removal, 8.0);
        assert_eq!(config.guidance.min_data_points_required, 50);
        assert_eq!(config.guidance.aggressiveness, Aggressiveness::Conservative);
        assert_eq!(config.guidance.scoring, ScoringPreset::Simple);
        assert_eq!(config.guidance.preference_rank(StrategyKind::Removal), 1);
        assert_eq!(config.guidance.preference_rank(StrategyKind::Capping), 2);
    }

    #[test]
    fn test_bundled_config_matches_defaults() {
        let config = load_config("../../config/dataguard.toml").expect("Failed to load config");
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.guidance, GuidanceConfig::default());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config("does-not-exist.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.guidance, GuidanceConfig::default());
        assert_eq!(config.guidance.min_data_points_required, 30);
    }

    #[test]
    fn test_isolation_forest_alias() {
        let config = parse_config("[detection]\nmethod = \"isolation_forest\"\nthreshold = 0.4").unwrap();
        assert_eq!(config.detection.method, DetectionMethod::IsolationHeuristic);
        assert_eq!(config.detection.resolved_cutoff(), 0.4);
    }

    #[test]
    fn test_resolved_cutoff_follows_sensitivity() {
        let iqr = DetectionConfig::new(DetectionMethod::Iqr).with_sensitivity(Sensitivity::Low);
        assert_eq!(iqr.resolved_cutoff(), 3.0);

        let z = DetectionConfig::new(DetectionMethod::ZScore);
        assert_eq!(z.resolved_cutoff(), 3.0);

        let iso = DetectionConfig::new(DetectionMethod::IsolationHeuristic)
            .with_sensitivity(Sensitivity::High);
        assert_eq!(iso.resolved_cutoff(), 0.5);
    }

    #[test]
    fn test_capping_percentiles() {
        assert_eq!(Aggressiveness::Moderate.to_capping_percentiles(), (5.0, 95.0));
        assert_eq!(Aggressiveness::Aggressive.to_capping_percentiles(), (10.0, 90.0));
    }
}
