//! loudmon-analyzer library interface
//!
//! Measures the loudness of live multicast streams with ffmpeg's ebur128
//! filter, classifies each stream against a configured band and posts the
//! result to a collector, a bounded group of streams at a time.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::{StartupError, StartupResult};

use crate::config::AnalyzerConfig;
use crate::services::{CollectorClient, LoudnessMeter};
use crate::workflow::BatchScheduler;
use std::sync::Arc;
use tracing::info;

/// Build the production scheduler from validated configuration
///
/// Fails if the measurement tool does not run or the HTTP client cannot be
/// built, so a broken setup never starts the first group.
pub async fn build_scheduler(config: &AnalyzerConfig) -> StartupResult<BatchScheduler> {
    let meter = LoudnessMeter::new(config.meter.clone());
    meter.check_available().await?;
    info!(
        program = %config.meter.program.display(),
        filter = %config.meter.filter_graph(),
        "Measurement tool available"
    );

    let collector = CollectorClient::new(&config.collector)?;
    info!(endpoint = %collector.endpoint(), "Collector client ready");

    let scheduler = BatchScheduler::new(
        Arc::new(meter),
        Arc::new(collector),
        config.scheduler_settings(),
    )?;
    Ok(scheduler)
}
