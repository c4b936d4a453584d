//! Seams between the batch scheduler and its collaborators
//!
//! The scheduler only sees these traits, so tests swap in deterministic
//! probes and in-memory sinks without spawning processes or sockets.

use crate::models::{ClassifiedRecord, LoudnessSummary, StreamDescriptor};
use crate::services::collector_client::DeliveryError;
use async_trait::async_trait;
use std::time::Duration;

/// Time-boxed loudness measurement of one stream
#[async_trait]
pub trait LoudnessProbe: Send + Sync {
    /// Measure for at most `duration_limit`
    ///
    /// `None` means no momentary samples were collected. That is a valid
    /// outcome (unreachable endpoint, silent stream, tool crash), not an error.
    async fn measure(
        &self,
        descriptor: &StreamDescriptor,
        duration_limit: Duration,
    ) -> Option<LoudnessSummary>;
}

/// Destination for classified records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// One delivery attempt, no retry
    async fn deliver(&self, record: &ClassifiedRecord) -> Result<(), DeliveryError>;
}
