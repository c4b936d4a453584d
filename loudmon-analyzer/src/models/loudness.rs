//! Loudness results and the records delivered to the collector

use crate::models::StreamDescriptor;
use crate::services::classifier::{classify, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate of the momentary readings collected for one stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessSummary {
    pub min_db: f64,
    pub max_db: f64,
    pub avg_db: f64,
}

impl LoudnessSummary {
    /// Summarize samples; `None` when there are none
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (min_db, max_db, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &value| (min.min(value), max.max(value), sum + value),
        );

        Some(Self {
            min_db,
            max_db,
            avg_db: sum / samples.len() as f64,
        })
    }
}

/// Loudness verdict for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    TooLow,
    Normal,
    TooLoud,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::TooLow => "too_low",
            Status::Normal => "normal",
            Status::TooLoud => "too_loud",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement record sent to the collector, flattened into one JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    #[serde(flatten)]
    pub stream: StreamDescriptor,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub loudness: LoudnessSummary,
    pub status: Status,
}

impl ClassifiedRecord {
    /// Build a record stamped now, with status derived from `avg_db`
    pub fn new(stream: StreamDescriptor, loudness: LoudnessSummary, thresholds: &Thresholds) -> Self {
        Self {
            stream,
            timestamp: loudmon_common::time::now(),
            loudness,
            status: classify(loudness.avg_db, thresholds),
        }
    }
}
