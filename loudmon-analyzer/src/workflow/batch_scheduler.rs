//! Batch scheduler
//!
//! Splits the descriptor sequence into contiguous groups of `group_size` and
//! runs one measure → classify → deliver pipeline per stream, all pipelines
//! of a group concurrently. The next group starts only after every pipeline
//! of the current one has finished, so at most `group_size` measurements are
//! ever in flight.
//!
//! # Error isolation
//! A stream that yields no samples, fails delivery or panics only affects
//! its own outcome. Nothing is retried and nothing aborts the run.

use crate::models::{
    ClassifiedRecord, Profile, RunSummary, SchedulerState, StreamDescriptor, StreamOutcome,
};
use crate::services::classifier::Thresholds;
use crate::types::{LoudnessProbe, RecordSink};
use futures::FutureExt;
use loudmon_common::{Error, Result};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Scheduler parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Streams per group, also the concurrency bound
    pub group_size: usize,
    /// Per-stream measurement ceiling
    pub duration_limit: Duration,
    pub thresholds: Thresholds,
}

/// Progress notifications
#[derive(Debug)]
pub enum SchedulerEvent {
    StateChanged(SchedulerState),
    StreamFinished {
        group: usize,
        name: String,
        profile: Profile,
        outcome: StreamOutcome,
    },
    GroupCompleted {
        group: usize,
        size: usize,
    },
}

/// Bounded-concurrency measurement scheduler
pub struct BatchScheduler {
    probe: Arc<dyn LoudnessProbe>,
    sink: Arc<dyn RecordSink>,
    settings: SchedulerSettings,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl BatchScheduler {
    pub fn new(
        probe: Arc<dyn LoudnessProbe>,
        sink: Arc<dyn RecordSink>,
        settings: SchedulerSettings,
    ) -> Result<Self> {
        if settings.group_size == 0 {
            return Err(Error::Config("Group size must be at least 1".to_string()));
        }
        if settings.duration_limit.is_zero() {
            return Err(Error::Config(
                "Measurement duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            probe,
            sink,
            settings,
            event_tx: None,
        })
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Measure every descriptor, one group at a time
    pub async fn run<I>(&self, descriptors: I) -> RunSummary
    where
        I: IntoIterator<Item = StreamDescriptor>,
    {
        let mut summary = RunSummary::new();
        let mut descriptors = descriptors.into_iter();
        self.set_state(SchedulerState::Idle);

        info!(
            run_id = %summary.run_id,
            group_size = self.settings.group_size,
            duration_limit = ?self.settings.duration_limit,
            "Starting measurement run"
        );

        loop {
            let group: Vec<StreamDescriptor> =
                descriptors.by_ref().take(self.settings.group_size).collect();
            if group.is_empty() {
                break;
            }

            summary.groups += 1;
            let group_no = summary.groups;
            self.run_group(group_no, group, &mut summary).await;
        }

        summary.finish();
        self.set_state(SchedulerState::Done);

        info!(
            run_id = %summary.run_id,
            groups = summary.groups,
            attempted = summary.attempted,
            measured = summary.measured,
            delivered = summary.delivered,
            failed = summary.failed,
            "Measurement run completed"
        );

        summary
    }

    async fn run_group(
        &self,
        group_no: usize,
        group: Vec<StreamDescriptor>,
        summary: &mut RunSummary,
    ) {
        let size = group.len();
        self.set_state(SchedulerState::Dispatching {
            group: group_no,
            size,
        });

        let mut pipelines = JoinSet::new();
        for descriptor in group {
            let probe = Arc::clone(&self.probe);
            let sink = Arc::clone(&self.sink);
            let limit = self.settings.duration_limit;
            let thresholds = self.settings.thresholds;

            pipelines.spawn(async move {
                let name = descriptor.name.clone();
                let profile = descriptor.profile;
                let outcome = AssertUnwindSafe(measure_and_report(
                    probe.as_ref(),
                    sink.as_ref(),
                    descriptor,
                    limit,
                    &thresholds,
                ))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| StreamOutcome::Aborted(panic_message(panic)));
                (name, profile, outcome)
            });
        }

        self.set_state(SchedulerState::AwaitingGroup { group: group_no });

        // Outcomes are tallied here one at a time, so counters need no locking
        while let Some(joined) = pipelines.join_next().await {
            match joined {
                Ok((name, profile, outcome)) => {
                    summary.record(&outcome);
                    self.emit(SchedulerEvent::StreamFinished {
                        group: group_no,
                        name,
                        profile,
                        outcome,
                    });
                }
                Err(e) => {
                    error!(group = group_no, error = %e, "Pipeline task lost");
                    summary.record(&StreamOutcome::Aborted(e.to_string()));
                }
            }
        }

        debug!(group = group_no, size, "Group completed");
        self.emit(SchedulerEvent::GroupCompleted {
            group: group_no,
            size,
        });
    }

    fn set_state(&self, state: SchedulerState) {
        debug!(state = ?state, "Scheduler state");
        self.emit(SchedulerEvent::StateChanged(state));
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            // Receiver gone just means nobody is watching progress
            let _ = tx.send(event);
        }
    }
}

/// One stream: measure, classify, deliver
async fn measure_and_report(
    probe: &dyn LoudnessProbe,
    sink: &dyn RecordSink,
    descriptor: StreamDescriptor,
    duration_limit: Duration,
    thresholds: &Thresholds,
) -> StreamOutcome {
    let Some(loudness) = probe.measure(&descriptor, duration_limit).await else {
        warn!(
            stream = %descriptor.name,
            profile = %descriptor.profile,
            url = %descriptor.endpoint_url,
            "No loudness samples collected"
        );
        return StreamOutcome::NoSignal;
    };

    let record = ClassifiedRecord::new(descriptor, loudness, thresholds);

    match sink.deliver(&record).await {
        Ok(()) => {
            info!(
                stream = %record.stream.name,
                profile = %record.stream.profile,
                avg_db = record.loudness.avg_db,
                status = %record.status,
                "Measurement delivered"
            );
            StreamOutcome::Delivered(record.status)
        }
        Err(e) => {
            warn!(
                stream = %record.stream.name,
                profile = %record.stream.profile,
                http_status = ?e.status(),
                error = %e,
                "Delivery failed"
            );
            StreamOutcome::DeliveryFailed(e)
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {}", msg)
    } else {
        "pipeline panicked".to_string()
    }
}
