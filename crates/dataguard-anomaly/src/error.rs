//! Error types for detection, preprocessing and configuration

use crate::strategy::StrategyKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuidanceError>;

/// Errors surfaced to callers of the guidance API.
#[derive(Error, Debug)]
pub enum GuidanceError {
    #[error("series is empty")]
    EmptySeries,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors loading a TOML configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single preprocessing step. Never escapes `execute_step`;
/// it is rendered into `StepResult::errors` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Unknown preprocessing type: {0}")]
    UnsupportedStrategy(StrategyKind),

    #[error("missing parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown transformation '{0}'")]
    UnknownTransformation(String),

    #[error("unknown imputation method '{0}'")]
    UnknownImputationMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_error_messages() {
        let err = StrategyError::UnsupportedStrategy(StrategyKind::Capping);
        assert_eq!(err.to_string(), "Unknown preprocessing type: capping");

        let err = StrategyError::MissingParameter("remove_indices");
        assert_eq!(err.to_string(), "missing parameter 'remove_indices'");

        let err = StrategyError::UnknownTransformation("cube".to_string());
        assert_eq!(err.to_string(), "unknown transformation 'cube'");
    }

    #[test]
    fn test_config_error_wraps_into_guidance_error() {
        let parse = toml::from_str::<toml::Table>("not = [valid").unwrap_err();
        let err: GuidanceError = ConfigError::from(parse).into();
        assert!(err.to_string().starts_with("config error: failed to parse config"));
    }
}
