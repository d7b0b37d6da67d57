use chrono::{Duration, TimeZone, Utc};
use dataguard_anomaly::config::{DetectionConfig, DetectionMethod, Sensitivity};
use dataguard_anomaly::detection::{Severity, detect, isolation_scores};
use dataguard_core::DataPoint;
use proptest::prelude::*;

fn daily(values: &[f64]) -> Vec<DataPoint> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| DataPoint::new(start + Duration::days(i as i64), *v))
        .collect()
}

const METHODS: [DetectionMethod; 3] = [
    DetectionMethod::Iqr,
    DetectionMethod::ZScore,
    DetectionMethod::IsolationHeuristic,
];

#[test]
fn test_iqr_flags_single_spike() {
    let series = daily(&[10.0, 12.0, 11.0, 13.0, 12.0, 100.0, 11.0, 10.0, 12.0, 11.0]);
    let config = DetectionConfig::new(DetectionMethod::Iqr).with_sensitivity(Sensitivity::Medium);

    let result = detect(&series, &config);

    println!("Summary: {}", result.summary);
    assert_eq!(result.outliers.len(), 1);
    assert_eq!(result.outliers[0].index, 5);
    assert_eq!(result.outliers[0].value, 100.0);
    assert_eq!(result.outliers[0].timestamp, series[5].timestamp);
    assert_eq!(result.outliers[0].severity, Severity::Critical);
    assert_eq!(result.visualization.outlier_indices, vec![5]);
    assert_eq!(result.statistics.total_points, 10);
    assert_eq!(result.statistics.severity_breakdown.critical, 1);
    assert!(result.summary.contains("outlier"));
}

#[test]
fn test_clean_series_summary() {
    let series = daily(&[10.0, 11.0, 12.0, 11.0, 10.0, 12.0, 11.0, 10.0, 12.0, 11.0]);

    let result = detect(&series, &DetectionConfig::default());

    assert!(result.outliers.is_empty());
    assert_eq!(result.statistics.outlier_percentage, 0.0);
    assert_eq!(
        result.summary,
        "No outliers detected in 10 data points. Data quality appears good."
    );
}

#[test]
fn test_every_method_handles_empty_series() {
    for method in METHODS {
        let result = detect(&[], &DetectionConfig::new(method));
        assert!(result.outliers.is_empty());
        assert_eq!(result.statistics.total_points, 0);
        assert_eq!(result.statistics.outlier_percentage, 0.0);
    }
}

#[test]
fn test_z_score_needs_long_series_to_flag() {
    // a single spike can never exceed |z| = sqrt(n - 1), so use 30 points
    let mut values: Vec<f64> = (0..29).map(|i| 50.0 + (i % 5) as f64).collect();
    values.insert(14, 400.0);
    let series = daily(&values);

    let result = detect(&series, &DetectionConfig::new(DetectionMethod::ZScore));

    assert_eq!(result.outlier_indices(), vec![14]);
    assert!(result.outliers[0].z_score > 3.0);
    assert!(result.outliers[0].distance_from_threshold > 0.0);
}

#[test]
fn test_threshold_override_widens_z_cutoff() {
    let mut values: Vec<f64> = (0..29).map(|i| 50.0 + (i % 5) as f64).collect();
    values.insert(14, 400.0);
    let series = daily(&values);

    let strict = detect(&series, &DetectionConfig::new(DetectionMethod::ZScore).with_threshold(100.0));
    assert!(strict.outliers.is_empty());
    assert_eq!(strict.threshold, 100.0);
}

#[test]
fn test_isolation_heuristic_finds_isolated_point() {
    let series = daily(&[20.0, 21.0, 19.0, 20.0, 22.0, 21.0, 20.0, 19.0, 90.0, 21.0, 20.0, 22.0]);

    let result = detect(&series, &DetectionConfig::new(DetectionMethod::IsolationHeuristic));

    assert!(result.is_outlier(8));
    assert_eq!(result.outliers.len(), 1);
}

#[test]
fn test_sensitivity_is_monotonic_for_iqr() {
    let series = daily(&[10.0, 12.0, 11.0, 13.0, 12.0, 16.0, 11.0, 10.0, 12.0, 30.0, 11.0, 12.0]);

    let low = detect(&series, &DetectionConfig::new(DetectionMethod::Iqr).with_sensitivity(Sensitivity::Low));
    let high = detect(&series, &DetectionConfig::new(DetectionMethod::Iqr).with_sensitivity(Sensitivity::High));

    assert!(low.outliers.len() <= high.outliers.len());
    for index in low.outlier_indices() {
        assert!(high.is_outlier(index));
    }
}

#[test]
fn test_result_serializes_for_charts() {
    let series = daily(&[10.0, 12.0, 11.0, 13.0, 12.0, 100.0, 11.0, 10.0, 12.0, 11.0]);
    let result = detect(&series, &DetectionConfig::default());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["method"], "iqr");
    assert_eq!(json["outliers"][0]["severity"], "critical");
    assert_eq!(json["visualization"]["normal_color"], "#3B82F6");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn spike_is_always_flagged_by_iqr(
        base in prop::collection::vec(10.0..20.0_f64, 8..60),
        position in any::<prop::sample::Index>(),
    ) {
        let mut values = base.clone();
        let at = position.index(values.len() + 1);
        values.insert(at, 500.0);
        let series = daily(&values);

        let result = detect(&series, &DetectionConfig::new(DetectionMethod::Iqr));

        prop_assert!(result.is_outlier(at));
        prop_assert!(result.visualization.outlier_indices.contains(&at));
    }

    #[test]
    fn uniform_series_has_no_outliers(value in -1.0e4..1.0e4_f64, len in 1usize..80) {
        let series = daily(&vec![value; len]);
        for method in METHODS {
            let result = detect(&series, &DetectionConfig::new(method));
            prop_assert!(result.outliers.is_empty());
            prop_assert_eq!(result.statistics.outlier_percentage, 0.0);
        }
    }

    #[test]
    fn outlier_indices_are_valid(values in prop::collection::vec(-1.0e3..1.0e3_f64, 0..80)) {
        let series = daily(&values);
        for method in METHODS {
            let result = detect(&series, &DetectionConfig::new(method));
            for outlier in &result.outliers {
                prop_assert!(outlier.index < series.len());
                prop_assert_eq!(outlier.value, series[outlier.index].value);
            }
            prop_assert_eq!(result.statistics.outlier_count, result.outliers.len());
        }
    }

    #[test]
    fn severity_is_monotonic(z in 0.0..10.0_f64, d in 0.0..10.0_f64, dz in 0.0..5.0_f64, dd in 0.0..5.0_f64) {
        let base = Severity::classify(z, d, 1.0);
        let larger = Severity::classify(z + dz, d + dd, 1.0);
        prop_assert!(larger >= base);
    }

    #[test]
    fn isolation_scores_stay_normalized(values in prop::collection::vec(-1.0e3..1.0e3_f64, 0..60)) {
        let scores = isolation_scores(&values);
        prop_assert_eq!(scores.len(), values.len());
        for s in scores {
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
