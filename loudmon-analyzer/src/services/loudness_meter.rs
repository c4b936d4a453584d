//! ffmpeg ebur128 loudness meter
//!
//! Runs `ffmpeg` against a stream URL with the ebur128 filter and collects
//! momentary loudness from its stderr until the stream ends or the duration
//! limit passes, whichever comes first.
//!
//! # Deadline
//! The limit is enforced here, not by ffmpeg: live multicast input never
//! reaches EOF on its own. When the deadline passes the child is killed and
//! reaped, and every sample parsed before that point is still used.
//!
//! # Process hygiene
//! Children are spawned with `kill_on_drop`, so a cancelled measurement
//! cannot leave an orphaned ffmpeg behind.

use crate::models::{LoudnessSummary, StreamDescriptor};
use crate::services::momentary_parser::MomentaryParser;
use crate::types::LoudnessProbe;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Default measurement tool
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Default momentary meter window passed to ebur128 (`meter=`)
pub const DEFAULT_METER_WINDOW: u32 = 9;

/// How long to wait for a killed child to be reaped
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Loudness meter errors
#[derive(Debug, Error)]
pub enum MeterError {
    /// Tool binary not found
    #[error("Measurement tool not found: {0}")]
    ToolNotFound(String),

    /// Tool could not be started
    #[error("Failed to start measurement tool: {0}")]
    Spawn(String),

    /// Tool ran but reported failure
    #[error("Measurement tool check failed: {0}")]
    ToolFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the tool is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterSettings {
    pub program: PathBuf,
    pub meter_window: u32,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_FFMPEG),
            meter_window: DEFAULT_METER_WINDOW,
        }
    }
}

impl MeterSettings {
    /// ebur128 with true peak, no video output and the configured window
    pub fn filter_graph(&self) -> String {
        format!("ebur128=peak=true:video=0:meter={}", self.meter_window)
    }

    /// Full argument list for one stream, output discarded
    pub fn args(&self, url: &str) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            url.to_string(),
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ]
    }
}

/// Result of one tool run
#[derive(Debug)]
pub struct MeterRun {
    pub summary: Option<LoudnessSummary>,
    pub sample_count: usize,
    /// Killed at the deadline rather than exiting on its own
    pub timed_out: bool,
    /// Exit status when the tool ended on its own
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

/// Subprocess-backed loudness meter
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    settings: MeterSettings,
}

impl LoudnessMeter {
    pub fn new(settings: MeterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MeterSettings {
        &self.settings
    }

    /// Verify the tool runs (`-version`)
    pub async fn check_available(&self) -> Result<(), MeterError> {
        let status = Command::new(&self.settings.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        debug!(
            program = %self.settings.program.display(),
            success = status.success(),
            "Measurement tool availability check"
        );

        if !status.success() {
            return Err(MeterError::ToolFailed(format!(
                "{} -version exited with {}",
                self.settings.program.display(),
                status
            )));
        }
        Ok(())
    }

    /// Run the tool against `url` for at most `limit`
    pub async fn run(&self, url: &str, limit: Duration) -> Result<MeterRun, MeterError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + limit;

        let mut child = Command::new(&self.settings.program)
            .args(self.settings.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MeterError::Spawn("stderr was not captured".to_string()))?;

        debug!(url, pid = ?child.id(), limit = ?limit, "Measurement tool started");

        let mut parser = MomentaryParser::new();
        let natural_end = tokio::time::timeout_at(deadline, async {
            let mut buf = [0u8; 4096];
            loop {
                let read = stderr.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                parser.feed(&buf[..read]);
            }
            child.wait().await
        })
        .await;

        let (timed_out, exit_status) = match natural_end {
            Ok(Ok(status)) => {
                parser.finish();
                (false, Some(status))
            }
            Ok(Err(e)) => {
                warn!(url, error = %e, "Reading measurement output failed");
                parser.discard_partial();
                terminate(&mut child).await;
                (false, None)
            }
            Err(_) => {
                parser.discard_partial();
                terminate(&mut child).await;
                (true, None)
            }
        };

        let run = MeterRun {
            summary: parser.summary(),
            sample_count: parser.samples().len(),
            timed_out,
            exit_status,
            elapsed: started.elapsed(),
        };

        debug!(
            url,
            samples = run.sample_count,
            lines = parser.lines_seen(),
            timed_out = run.timed_out,
            exit = ?run.exit_status,
            elapsed = ?run.elapsed,
            "Measurement tool finished"
        );

        Ok(run)
    }

    fn spawn_error(&self, e: std::io::Error) -> MeterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MeterError::ToolNotFound(self.settings.program.display().to_string())
        } else {
            MeterError::Spawn(e.to_string())
        }
    }
}

/// Kill and reap a child that is still running
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        // Already exited; reaping below still collects it
        debug!(error = %e, "Kill signal not delivered");
    }

    match tokio::time::timeout(REAP_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(exit = %status, "Measurement tool terminated"),
        Ok(Err(e)) => warn!(error = %e, "Failed to reap measurement tool"),
        Err(_) => warn!("Measurement tool did not exit after kill"),
    }
}

#[async_trait]
impl LoudnessProbe for LoudnessMeter {
    async fn measure(
        &self,
        descriptor: &StreamDescriptor,
        duration_limit: Duration,
    ) -> Option<LoudnessSummary> {
        match self.run(&descriptor.endpoint_url, duration_limit).await {
            Ok(run) => run.summary,
            Err(e) => {
                warn!(
                    stream = %descriptor.name,
                    profile = %descriptor.profile,
                    error = %e,
                    "Measurement could not run"
                );
                None
            }
        }
    }
}
