//! Preprocessing workflow - ordered steps built from suggestions, executed
//! against a series through a registry of strategy handlers.
//!
//! Step lifecycle: `Pending -> InProgress -> Completed | Failed`.
//! Workflow lifecycle: `Draft -> InProgress -> Completed | Failed`.

use crate::advisor::PreprocessingSuggestion;
use crate::detection::DetectionResult;
use crate::error::StrategyError;
use crate::strategy::{
    CappingStrategy, ImputationStrategy, Parameters, RemovalStrategy, StrategyHandler, StrategyKind,
    StrategyOutcome, TransformationStrategy,
};
use chrono::{DateTime, Utc};
use dataguard_core::{DataPoint, DataStatistics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Failed,
}

/// Effect report of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub processed_data: Vec<DataPoint>,
    pub records_affected: usize,
    pub records_removed: usize,
    pub records_modified: usize,
    pub quality_improvement: f64, // [0, 100]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl StepResult {
    fn completed(kind: StrategyKind, outcome: StrategyOutcome, quality_improvement: f64) -> Self {
        Self {
            success: true,
            records_affected: outcome.records_affected(),
            records_removed: outcome.records_removed,
            records_modified: outcome.records_modified,
            processed_data: outcome.series,
            quality_improvement,
            message: format!("Successfully executed {} preprocessing step", kind),
            errors: None,
        }
    }

    // failed steps hand back the input unchanged
    fn failed(kind: StrategyKind, series: &[DataPoint], error: &StrategyError) -> Self {
        Self {
            success: false,
            processed_data: series.to_vec(),
            records_affected: 0,
            records_removed: 0,
            records_modified: 0,
            quality_improvement: 0.0,
            message: format!("Failed to execute {} step", kind),
            errors: Some(vec![error.to_string()]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub suggestion_id: String,
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    pub order: usize, // 1-based
    pub parameters: Parameters,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub data_quality_improvement: f64,
    pub records_affected: usize,
    pub forecast_accuracy_gain: f64,
}

impl EstimatedImpact {
    /// Rough, pre-execution estimate for a set of chosen suggestions.
    pub fn estimate(suggestions: &[PreprocessingSuggestion], series_len: usize, result: &DetectionResult) -> Self {
        let quality: f64 = suggestions.iter().map(|s| s.applicability * 20.0).sum();
        let quality = quality.min(100.0);
        let affected = result.statistics.outlier_count * suggestions.len();

        Self {
            data_quality_improvement: quality,
            records_affected: affected.min(series_len),
            forecast_accuracy_gain: quality * 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub steps: Vec<WorkflowStep>,
    pub estimated_impact: EstimatedImpact,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of running a whole workflow.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub series: Vec<DataPoint>,
    pub results: Vec<StepResult>,
    pub status: WorkflowStatus,
}

impl WorkflowRun {
    pub fn succeeded(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}

/// One step per suggestion, in the order given.
pub fn create_workflow(
    suggestions: &[PreprocessingSuggestion],
    series: &[DataPoint],
    result: &DetectionResult,
) -> Workflow {
    let steps = suggestions
        .iter()
        .enumerate()
        .map(|(i, suggestion)| WorkflowStep {
            id: format!("step-{}", i + 1),
            suggestion_id: suggestion.id.clone(),
            kind: suggestion.kind,
            order: i + 1,
            parameters: suggestion.implementation.parameters.clone(),
            description: suggestion.title.clone(),
            status: StepStatus::Pending,
            result: None,
        })
        .collect();

    Workflow {
        id: Uuid::new_v4(),
        steps,
        estimated_impact: EstimatedImpact::estimate(suggestions, series.len(), result),
        status: WorkflowStatus::Draft,
        created_at: Utc::now(),
        completed_at: None,
    }
}

impl Workflow {
    /// Execute pending steps in order, threading each output into the next.
    /// Stops at the first failed step; later steps stay pending.
    ///
    /// On a re-run, completed steps are not executed again; their recorded
    /// output becomes the input of the next step.
    pub fn run(&mut self, executor: &StepExecutor, series: &[DataPoint]) -> WorkflowRun {
        self.status = WorkflowStatus::InProgress;
        info!(workflow = %self.id, steps = self.steps.len(), "running preprocessing workflow");

        let mut current = series.to_vec();
        let mut results = Vec::with_capacity(self.steps.len());

        for step in self.steps.iter_mut() {
            if step.status == StepStatus::Completed {
                if let Some(done) = &step.result {
                    current = done.processed_data.clone();
                }
                debug!(step = %step.id, "step already completed, reusing its output");
                continue;
            }

            let result = executor.execute(step, &current);
            let success = result.success;
            if success {
                current = result.processed_data.clone();
            }
            results.push(result);

            if !success {
                self.status = WorkflowStatus::Failed;
                warn!(workflow = %self.id, step = %step.id, "workflow halted on failed step");
                return WorkflowRun {
                    series: current,
                    results,
                    status: self.status,
                };
            }
        }

        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(Utc::now());
        info!(workflow = %self.id, remaining_points = current.len(), "workflow completed");

        WorkflowRun {
            series: current,
            results,
            status: self.status,
        }
    }

    /// (completed, total)
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        (done, self.steps.len())
    }
}

// EXECUTOR //

/// Registry of strategy handlers keyed by kind.
pub struct StepExecutor {
    handlers: HashMap<StrategyKind, Box<dyn StrategyHandler>>,
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::empty()
            .with_handler(Box::new(RemovalStrategy))
            .with_handler(Box::new(ImputationStrategy))
            .with_handler(Box::new(CappingStrategy))
            .with_handler(Box::new(TransformationStrategy))
    }
}

impl StepExecutor {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    // registering a kind twice replaces the earlier handler
    pub fn with_handler(mut self, handler: Box<dyn StrategyHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    pub fn supports(&self, kind: StrategyKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run one step. Updates the step's status in place and attaches the
    /// result on success. Never panics or propagates strategy errors.
    pub fn execute(&self, step: &mut WorkflowStep, series: &[DataPoint]) -> StepResult {
        step.status = StepStatus::InProgress;
        debug!(step = %step.id, kind = %step.kind, points = series.len(), "executing preprocessing step");

        let outcome = self
            .handlers
            .get(&step.kind)
            .ok_or(StrategyError::UnsupportedStrategy(step.kind))
            .and_then(|handler| handler.apply(series, &step.parameters));

        match outcome {
            Ok(outcome) => {
                let quality = quality_improvement(series, &outcome.series);
                let result = StepResult::completed(step.kind, outcome, quality);
                step.status = StepStatus::Completed;
                step.result = Some(result.clone());
                info!(
                    step = %step.id,
                    kind = %step.kind,
                    removed = result.records_removed,
                    modified = result.records_modified,
                    "preprocessing step completed"
                );
                result
            }
            Err(err) => {
                step.status = StepStatus::Failed;
                warn!(step = %step.id, kind = %step.kind, error = %err, "preprocessing step failed");
                StepResult::failed(step.kind, series, &err)
            }
        }
    }
}

/// Execute a single step with the default handler registry.
pub fn execute_step(step: &mut WorkflowStep, series: &[DataPoint]) -> StepResult {
    StepExecutor::default().execute(step, series)
}

/// Gain from fewer outliers and lower variance, in [0, 100].
pub fn quality_improvement(original: &[DataPoint], processed: &[DataPoint]) -> f64 {
    let before = DataStatistics::from_points(original);
    let after = DataStatistics::from_points(processed);

    let outlier_gain = (before.outlier_percentage - after.outlier_percentage).max(0.0);
    let variance_gain = if before.std_dev > 0.0 {
        ((before.std_dev - after.std_dev) / before.std_dev * 100.0).max(0.0)
    } else {
        0.0
    };

    (outlier_gain * 2.0 + variance_gain * 0.5).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::REMOVE_INDICES;
    use chrono::TimeZone;
    use serde_json::json;

    fn series(values: &[f64]) -> Vec<DataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::new(Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(), *v))
            .collect()
    }

    fn step(kind: StrategyKind, parameters: serde_json::Value) -> WorkflowStep {
        WorkflowStep {
            id: "step-1".to_string(),
            suggestion_id: kind.as_str().to_string(),
            kind,
            order: 1,
            parameters: parameters.as_object().cloned().unwrap_or_default(),
            description: String::new(),
            status: StepStatus::Pending,
            result: None,
        }
    }

    #[test]
    fn test_execute_marks_step_completed() {
        let data = series(&[1.0, 2.0, 50.0, 3.0]);
        let mut s = step(StrategyKind::Removal, json!({ REMOVE_INDICES: [2] }));

        let result = StepExecutor::default().execute(&mut s, &data);

        assert!(result.success);
        assert_eq!(result.processed_data.len(), 3);
        assert_eq!(result.records_removed, 1);
        assert_eq!(result.records_affected, 1);
        assert_eq!(result.message, "Successfully executed removal preprocessing step");
        assert_eq!(s.status, StepStatus::Completed);
        assert!(s.result.is_some());
    }

    #[test]
    fn test_unregistered_kind_fails_step() {
        let data = series(&[1.0, 2.0, 3.0]);
        let mut s = step(StrategyKind::Capping, json!({}));

        let result = StepExecutor::empty().execute(&mut s, &data);

        assert!(!result.success);
        assert_eq!(result.message, "Failed to execute capping step");
        assert_eq!(result.processed_data, data);
        assert_eq!(
            result.errors,
            Some(vec!["Unknown preprocessing type: capping".to_string()])
        );
        assert_eq!(s.status, StepStatus::Failed);
        assert!(s.result.is_none());
    }

    #[test]
    fn test_missing_parameter_fails_step() {
        let data = series(&[1.0, 2.0, 3.0]);
        let mut s = step(StrategyKind::Removal, json!({}));

        let result = execute_step(&mut s, &data);
        assert!(!result.success);
        assert_eq!(result.processed_data.len(), 3);
        assert_eq!(s.status, StepStatus::Failed);
    }

    #[test]
    fn test_quality_improvement_bounds() {
        let flat = series(&[5.0; 10]);
        assert_eq!(quality_improvement(&flat, &flat), 0.0);

        let noisy = series(&[10.0, 11.0, 10.0, 12.0, 11.0, 10.0, 11.0, 12.0, 10.0, 400.0]);
        let cleaned = series(&[10.0, 11.0, 10.0, 12.0, 11.0, 10.0, 11.0, 12.0, 10.0]);
        let gain = quality_improvement(&noisy, &cleaned);
        assert!(gain > 0.0 && gain <= 100.0);
    }

    #[test]
    fn test_progress_counts_completed_steps() {
        let data = series(&[1.0, 2.0, 50.0, 3.0]);
        let mut workflow = Workflow {
            id: Uuid::new_v4(),
            steps: vec![step(StrategyKind::Removal, json!({ REMOVE_INDICES: [2] }))],
            estimated_impact: EstimatedImpact {
                data_quality_improvement: 0.0,
                records_affected: 0,
                forecast_accuracy_gain: 0.0,
            },
            status: WorkflowStatus::Draft,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert_eq!(workflow.progress(), (0, 1));

        let run = workflow.run(&StepExecutor::default(), &data);
        assert!(run.succeeded());
        assert_eq!(workflow.progress(), (1, 1));
        assert!(workflow.completed_at.is_some());
    }
}
