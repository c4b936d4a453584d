//! Test Helper Utilities
//!
//! Deterministic probes and in-memory sinks for exercising the batch
//! scheduler without ffmpeg or a collector.

#![allow(dead_code)]

use async_trait::async_trait;
use loudmon_analyzer::models::{ClassifiedRecord, LoudnessSummary, Profile, StreamDescriptor};
use loudmon_analyzer::services::DeliveryError;
use loudmon_analyzer::types::{LoudnessProbe, RecordSink};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// `count` low-profile descriptors named `ch-000`, `ch-001`, ...
pub fn descriptors(count: usize) -> Vec<StreamDescriptor> {
    (0..count)
        .map(|i| {
            StreamDescriptor::new(
                format!("ch-{:03}", i),
                format!("N{}", i % 4),
                Profile::Low,
                format!("udp://239.1.{}.{}:5000", i / 250, i % 250),
            )
        })
        .collect()
}

/// How the mock probe treats one stream
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Return this summary after the probe delay
    Measure(LoudnessSummary),
    /// No samples
    Silent,
    Panic,
    /// Never produces output; holds for the whole duration limit
    Hang,
}

/// Scripted probe that records concurrency
pub struct MockProbe {
    default: Behavior,
    overrides: HashMap<String, Behavior>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            delay: Duration::from_millis(20),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Probe that reports the same average for every stream
    pub fn constant(avg_db: f64) -> Self {
        Self::new(Behavior::Measure(summary(avg_db)))
    }

    pub fn with(mut self, name: &str, behavior: Behavior) -> Self {
        self.overrides.insert(name.to_string(), behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LoudnessProbe for MockProbe {
    async fn measure(
        &self,
        descriptor: &StreamDescriptor,
        duration_limit: Duration,
    ) -> Option<LoudnessSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let behavior = self
            .overrides
            .get(&descriptor.name)
            .copied()
            .unwrap_or(self.default);

        match behavior {
            Behavior::Measure(summary) => {
                tokio::time::sleep(self.delay).await;
                Some(summary)
            }
            Behavior::Silent => {
                tokio::time::sleep(self.delay).await;
                None
            }
            Behavior::Panic => panic!("probe exploded on {}", descriptor.name),
            Behavior::Hang => {
                tokio::time::sleep(duration_limit).await;
                None
            }
        }
    }
}

pub fn summary(avg_db: f64) -> LoudnessSummary {
    LoudnessSummary {
        min_db: avg_db - 3.0,
        max_db: avg_db + 2.0,
        avg_db,
    }
}

/// Sink that keeps delivered records and rejects chosen streams with a 500
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ClassifiedRecord>>,
    reject: HashSet<String>,
    attempts: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            reject: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ClassifiedRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn deliver(&self, record: &ClassifiedRecord) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject.contains(&record.stream.name) {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
