//! Core types for the data quality system
//! this crate contains the series data model and the statistics helpers
//! shared by detection, preprocessing and validation.
pub mod stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use stats::DataStatistics;

// DATA POINT //

/// One timestamped observation of a series.
/// Points are never mutated in place; preprocessing builds new points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>, // when the observation was taken

    pub value: f64, // the observed numeric value

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>, // secondary count (orders, tickets, ..) if the source has one
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    // copy of this point carrying a different value (timestamp and volume kept)
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            timestamp: self.timestamp,
            value,
            volume: self.volume,
        }
    }
}

// SERIES HELPERS //

/// Extract the numeric values of a series, in order.
pub fn values(series: &[DataPoint]) -> Vec<f64> {
    series.iter().map(|p| p.value).collect()
}

/// Parse a series from a JSON array of data points.
pub fn parse_series(json: &str) -> Result<Vec<DataPoint>, serde_json::Error> {
    serde_json::from_str(json)
}
