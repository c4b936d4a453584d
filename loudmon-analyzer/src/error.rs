//! Startup error type for loudmon-analyzer
//!
//! Everything here is fatal and happens before the first group starts.
//! Per-stream failures never surface as errors; they are
//! [`StreamOutcome`](crate::models::StreamOutcome)s.

use crate::services::{DeliveryError, MeterError, SourceError};
use thiserror::Error;

/// Configuration-level failure that stops the run before it begins
#[derive(Debug, Error)]
pub enum StartupError {
    /// Invalid or missing configuration value
    #[error(transparent)]
    Config(#[from] loudmon_common::Error),

    /// Channel list missing, unreadable or empty
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Measurement tool unusable
    #[error(transparent)]
    Meter(#[from] MeterError),

    /// Collector client could not be built
    #[error(transparent)]
    Collector(#[from] DeliveryError),
}

/// Result type for startup steps
pub type StartupResult<T> = Result<T, StartupError>;
