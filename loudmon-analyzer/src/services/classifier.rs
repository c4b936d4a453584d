//! Loudness classification
//!
//! `avg_db < too_low_below_db` is [`Status::TooLow`], `avg_db > too_loud_above_db`
//! is [`Status::TooLoud`], anything else (both bounds included) is
//! [`Status::Normal`].
//!
//! The band differs per deployment (a symmetric ±1 dB band around the target,
//! or a wider regulatory band), so thresholds are configuration; the defaults
//! below are the regulatory band.

use crate::models::Status;
use loudmon_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Averages strictly below this are too quiet
pub const DEFAULT_TOO_LOW_BELOW_DB: f64 = -23.0;

/// Averages strictly above this are too loud
pub const DEFAULT_TOO_LOUD_ABOVE_DB: f64 = -18.0;

/// Acceptable loudness band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub too_low_below_db: f64,
    pub too_loud_above_db: f64,
}

impl Thresholds {
    /// Validated band; both bounds finite and `low <= high`
    pub fn new(too_low_below_db: f64, too_loud_above_db: f64) -> Result<Self> {
        if !too_low_below_db.is_finite() || !too_loud_above_db.is_finite() {
            return Err(Error::InvalidInput(format!(
                "Loudness thresholds must be finite (got {} / {})",
                too_low_below_db, too_loud_above_db
            )));
        }
        if too_low_below_db > too_loud_above_db {
            return Err(Error::InvalidInput(format!(
                "Low threshold {} dB is above high threshold {} dB",
                too_low_below_db, too_loud_above_db
            )));
        }

        Ok(Self {
            too_low_below_db,
            too_loud_above_db,
        })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            too_low_below_db: DEFAULT_TOO_LOW_BELOW_DB,
            too_loud_above_db: DEFAULT_TOO_LOUD_ABOVE_DB,
        }
    }
}

/// Classify an average loudness
///
/// NaN compares false against both bounds and lands in `Normal`; the meter
/// never produces it.
pub fn classify(avg_db: f64, thresholds: &Thresholds) -> Status {
    if avg_db < thresholds.too_low_below_db {
        Status::TooLow
    } else if avg_db > thresholds.too_loud_above_db {
        Status::TooLoud
    } else {
        Status::Normal
    }
}
