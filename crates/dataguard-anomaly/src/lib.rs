//! DataGuard outlier detection & preprocessing guidance

pub mod activation;
pub mod advisor;
pub mod config;
pub mod detection;
pub mod error;
pub mod strategy;
pub mod validation;
pub mod workflow;

pub use activation::should_activate;
pub use advisor::{PreprocessingAdvisor, PreprocessingSuggestion, generate_suggestions, suggest_preprocessing};
pub use config::{DataGuardConfig, DetectionConfig, DetectionMethod, GuidanceConfig, Sensitivity, load_config};
pub use detection::{DetectionResult, OutlierPoint, Severity, detect};
pub use error::{GuidanceError, Result, StrategyError};
pub use strategy::{StrategyHandler, StrategyKind};
pub use validation::{ValidationReport, validate_results};
pub use workflow::{StepExecutor, StepResult, Workflow, WorkflowStep, create_workflow, execute_step};
