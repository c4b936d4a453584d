//! Scheduler state and run accounting

use crate::models::Status;
use crate::services::collector_client::DeliveryError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Batch scheduler state
///
/// Idle → Dispatching(1) → AwaitingGroup(1) → Dispatching(2) → ... → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    /// Starting every pipeline of a group (1-based group number)
    Dispatching { group: usize, size: usize },
    /// Waiting for the last pipeline of a group to finish
    AwaitingGroup { group: usize },
    Done,
}

/// How one stream's measure → classify → deliver pipeline ended
#[derive(Debug)]
pub enum StreamOutcome {
    Delivered(Status),
    /// Zero momentary samples before the deadline
    NoSignal,
    DeliveryFailed(DeliveryError),
    /// Pipeline task panicked or was cancelled
    Aborted(String),
}

impl StreamOutcome {
    /// A loudness summary was produced
    pub fn is_measured(&self) -> bool {
        matches!(self, StreamOutcome::Delivered(_) | StreamOutcome::DeliveryFailed(_))
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, StreamOutcome::Delivered(_))
    }
}

/// Aggregate counts for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub groups: usize,
    pub attempted: usize,
    pub measured: usize,
    pub delivered: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            groups: 0,
            attempted: 0,
            measured: 0,
            delivered: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Count one finished pipeline
    pub fn record(&mut self, outcome: &StreamOutcome) {
        self.attempted += 1;
        if outcome.is_measured() {
            self.measured += 1;
        }
        if outcome.is_delivered() {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
