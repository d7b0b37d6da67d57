//! Statistical outlier detection over a single series
//!
//! Three methods are available: IQR fences, population z-scores and a
//! nearest-neighbour distance heuristic. The heuristic borrows the name of
//! isolation forests in the UI, but it builds no trees and gives none of
//! their guarantees.

use crate::config::{DetectionConfig, DetectionMethod};
use chrono::{DateTime, Utc};
use dataguard_core::DataPoint;
use dataguard_core::stats::{self, IqrFences, STANDARD_IQR_MULTIPLIER};
use serde::{Deserialize, Serialize};
use tracing::debug;

// SEVERITY //

/// Outlier severity (ordered from lowest to highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Classify from the absolute z-score and the distance past the
    /// acceptable threshold, measured in units of `scale`.
    /// Either signal alone is enough to escalate.
    pub fn classify(z_score: f64, distance: f64, scale: f64) -> Self {
        let abs_z = z_score.abs();
        let normalized = if scale > 0.0 {
            distance / scale
        } else if distance > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        if abs_z > 4.0 || normalized > 3.0 {
            Severity::Critical
        } else if abs_z > 3.0 || normalized > 2.0 {
            Severity::High
        } else if abs_z > 2.0 || normalized > 1.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Severity::Critical => "Immediate investigation required. Consider removal or correction.",
            Severity::High => "Review data point. May require correction or special handling.",
            Severity::Medium => "Monitor this value. Consider transformation or capping.",
            Severity::Low => "Minor outlier. May be acceptable depending on context.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

// RESULT TYPES //

// a single flagged point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierPoint {
    pub index: usize,               // position in the analysed series
    pub value: f64,                 // observed value
    pub timestamp: DateTime<Utc>,   // observation time
    pub z_score: f64,               // signed population z-score
    pub severity: Severity,         // classified strength
    pub reason: String,             // why it was flagged
    pub suggested_action: String,   // what to do about it
    pub distance_from_threshold: f64, // how far past the acceptable bound
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityBreakdown {
    pub fn from_outliers(outliers: &[OutlierPoint]) -> Self {
        let mut breakdown = Self::default();
        for outlier in outliers {
            match outlier.severity {
                Severity::Low => breakdown.low += 1,
                Severity::Medium => breakdown.medium += 1,
                Severity::High => breakdown.high += 1,
                Severity::Critical => breakdown.critical += 1,
            }
        }
        breakdown
    }

    // critical + high
    pub fn extreme(&self) -> usize {
        self.critical + self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierStatistics {
    pub total_points: usize,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub severity_breakdown: SeverityBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightColors {
    pub low: String,
    pub medium: String,
    pub high: String,
    pub critical: String,
}

impl Default for HighlightColors {
    fn default() -> Self {
        Self {
            low: "#FFA500".to_string(),      // orange
            medium: "#FF8C00".to_string(),   // dark orange
            high: "#FF4500".to_string(),     // orange red
            critical: "#DC143C".to_string(), // crimson
        }
    }
}

impl HighlightColors {
    pub fn for_severity(&self, severity: Severity) -> &str {
        match severity {
            Severity::Low => &self.low,
            Severity::Medium => &self.medium,
            Severity::High => &self.high,
            Severity::Critical => &self.critical,
        }
    }
}

pub const NORMAL_COLOR: &str = "#3B82F6";

/// Everything a chart needs to highlight outliers.
/// The threshold band is always the 1.5x IQR band, whatever method ran,
/// so charts stay comparable across methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    pub data_points: Vec<DataPoint>,
    pub outlier_indices: Vec<usize>,
    pub thresholds: Thresholds,
    pub highlight_colors: HighlightColors,
    pub normal_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub outliers: Vec<OutlierPoint>,
    pub method: DetectionMethod,
    pub threshold: f64,
    pub visualization: VisualizationData,
    pub statistics: OutlierStatistics,
    pub summary: String,
}

impl DetectionResult {
    pub fn outlier_indices(&self) -> Vec<usize> {
        self.outliers.iter().map(|o| o.index).collect()
    }

    pub fn is_outlier(&self, index: usize) -> bool {
        self.outliers.iter().any(|o| o.index == index)
    }
}

// DETECTION //

// per-call view of the series shared by all methods
struct SeriesProfile<'a> {
    series: &'a [DataPoint],
    values: Vec<f64>,
    mean: f64,
    std_dev: f64,
}

impl<'a> SeriesProfile<'a> {
    fn new(series: &'a [DataPoint]) -> Self {
        let values = dataguard_core::values(series);
        let mean = stats::mean(&values);
        let std_dev = stats::population_std_dev(&values, mean);
        Self {
            series,
            values,
            mean,
            std_dev,
        }
    }

    fn z_score(&self, value: f64) -> f64 {
        stats::z_score(value, self.mean, self.std_dev)
    }

    fn outlier(
        &self,
        index: usize,
        z_score: f64,
        severity: Severity,
        reason: String,
        distance_from_threshold: f64,
    ) -> OutlierPoint {
        let point = &self.series[index];
        OutlierPoint {
            index,
            value: point.value,
            timestamp: point.timestamp,
            z_score,
            severity,
            reason,
            suggested_action: severity.suggested_action().to_string(),
            distance_from_threshold,
        }
    }
}

/// Detect outliers in `series` with the configured method.
///
/// Never fails: an empty or constant series yields zero outliers.
pub fn detect(series: &[DataPoint], config: &DetectionConfig) -> DetectionResult {
    let profile = SeriesProfile::new(series);
    let cutoff = config.resolved_cutoff();

    let (outliers, threshold) = match config.method {
        DetectionMethod::Iqr => detect_iqr(&profile, cutoff),
        DetectionMethod::ZScore => detect_z_score(&profile, cutoff),
        DetectionMethod::IsolationHeuristic => detect_isolation(&profile, cutoff),
    };

    let total_points = series.len();
    let outlier_count = outliers.len();
    let outlier_percentage = if total_points == 0 {
        0.0
    } else {
        outlier_count as f64 / total_points as f64 * 100.0
    };
    let severity_breakdown = SeverityBreakdown::from_outliers(&outliers);

    debug!(
        method = config.method.as_str(),
        threshold,
        total_points,
        outlier_count,
        "outlier detection finished"
    );

    let visualization = visualization_data(&profile, &outliers);
    let summary = summarize(outlier_count, total_points, outlier_percentage, &severity_breakdown);

    DetectionResult {
        outliers,
        method: config.method,
        threshold,
        visualization,
        statistics: OutlierStatistics {
            total_points,
            outlier_count,
            outlier_percentage,
            severity_breakdown,
        },
        summary,
    }
}

// IQR fences; the reported threshold is multiplier * IQR
fn detect_iqr(profile: &SeriesProfile<'_>, multiplier: f64) -> (Vec<OutlierPoint>, f64) {
    let sorted = stats::sorted_copy(&profile.values);
    let fences = IqrFences::from_sorted(&sorted, multiplier);

    let outliers = profile
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| !fences.contains(**v))
        .map(|(index, &value)| {
            let distance = (value - fences.lower).abs().min((value - fences.upper).abs());
            let z = profile.z_score(value);
            let severity = Severity::classify(z, distance, fences.iqr);
            let reason = if value < fences.lower {
                format!("Value {:.2} is below lower bound {:.2}", value, fences.lower)
            } else {
                format!("Value {:.2} is above upper bound {:.2}", value, fences.upper)
            };
            profile.outlier(index, z, severity, reason, distance)
        })
        .collect();

    (outliers, fences.iqr * multiplier)
}

fn detect_z_score(profile: &SeriesProfile<'_>, threshold: f64) -> (Vec<OutlierPoint>, f64) {
    let outliers = profile
        .values
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z = profile.z_score(value);
            if z.abs() <= threshold {
                return None;
            }
            let distance = (z.abs() - threshold) * profile.std_dev;
            let severity = Severity::classify(z, distance, profile.std_dev);
            let reason = format!(
                "Z-score of {:.2} exceeds threshold of {:.2}",
                z.abs(),
                threshold
            );
            Some(profile.outlier(index, z, severity, reason, distance))
        })
        .collect();

    (outliers, threshold)
}

fn detect_isolation(profile: &SeriesProfile<'_>, threshold: f64) -> (Vec<OutlierPoint>, f64) {
    let scores = isolation_scores(&profile.values);

    let outliers = scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > threshold)
        .map(|(index, &score)| {
            let z = profile.z_score(profile.values[index]);
            let distance = score - threshold;
            // scores live in [0,1]; stretch the excess so it is comparable
            // with the other methods' distances
            let severity = Severity::classify(z, distance * 100.0, 1.0);
            let reason = format!("Isolation score of {:.3} indicates anomalous behavior", score);
            profile.outlier(index, z, severity, reason, distance)
        })
        .collect();

    (outliers, threshold)
}

/// Heuristic isolation score in [0,1] for every value.
///
/// Mean distance to the `k = max(3, floor(sqrt(n)))` nearest neighbours,
/// divided by the largest pairwise distance in the series. O(n^2).
pub fn isolation_scores(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let sorted = stats::sorted_copy(values);
    let spread = sorted[n - 1] - sorted[0];
    if spread <= 0.0 {
        return vec![0.0; n];
    }

    let k = ((n as f64).sqrt().floor() as usize).max(3).min(n - 1);

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mut distances: Vec<f64> = values
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| (other - value).abs())
                .collect();
            distances.sort_by(|a, b| a.total_cmp(b));
            let avg = distances[..k].iter().sum::<f64>() / k as f64;
            avg / spread
        })
        .collect()
}

fn visualization_data(profile: &SeriesProfile<'_>, outliers: &[OutlierPoint]) -> VisualizationData {
    let sorted = stats::sorted_copy(&profile.values);
    let fences = IqrFences::from_sorted(&sorted, STANDARD_IQR_MULTIPLIER);

    VisualizationData {
        data_points: profile.series.to_vec(),
        outlier_indices: outliers.iter().map(|o| o.index).collect(),
        thresholds: Thresholds {
            lower: fences.lower,
            upper: fences.upper,
        },
        highlight_colors: HighlightColors::default(),
        normal_color: NORMAL_COLOR.to_string(),
    }
}

fn summarize(
    outlier_count: usize,
    total_points: usize,
    outlier_percentage: f64,
    breakdown: &SeverityBreakdown,
) -> String {
    if outlier_count == 0 {
        return format!(
            "No outliers detected in {} data points. Data quality appears good.",
            total_points
        );
    }

    let mut parts = vec![format!(
        "Detected {} outlier{} ({:.1}% of {} points)",
        outlier_count,
        if outlier_count > 1 { "s" } else { "" },
        outlier_percentage,
        total_points
    )];

    let severity_parts: Vec<String> = [
        (breakdown.critical, Severity::Critical),
        (breakdown.high, Severity::High),
        (breakdown.medium, Severity::Medium),
        (breakdown.low, Severity::Low),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, severity)| format!("{} {}", count, severity.as_str()))
    .collect();

    if !severity_parts.is_empty() {
        parts.push(format!("Severity: {}", severity_parts.join(", ")));
    }

    parts.join(". ") + "."
}
