//! loudmon-analyzer - Stream loudness analyzer
//!
//! Loads the channel list, measures every selected stream with ffmpeg's
//! ebur128 filter for a bounded time, classifies the average momentary
//! loudness and posts one record per stream to the collector.
//!
//! Configuration priority: CLI → environment → TOML → built-in defaults.

use anyhow::{bail, Context, Result};
use clap::Parser;
use loudmon_analyzer::config::{AnalyzerConfig, ConfigOverrides, TomlConfig, CONFIG_FILE_NAME};
use loudmon_analyzer::models::ProfileSelection;
use loudmon_analyzer::services::stream_source;
use loudmon_analyzer::workflow::SchedulerEvent;
use loudmon_common::config::{load_toml_config, resolve_config_path, write_toml_config, LoggingConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Number of descriptors shown by --dry-run
const DRY_RUN_PREVIEW: usize = 3;

/// Command-line arguments for loudmon-analyzer
#[derive(Parser, Debug)]
#[command(name = "loudmon-analyzer")]
#[command(about = "Measure live stream loudness and report it to the collector")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channel list CSV (prompted for when omitted)
    #[arg(long, env = "LOUDMON_CSV")]
    csv: Option<PathBuf>,

    /// Profiles to measure
    #[arg(short, long, value_enum, env = "LOUDMON_PROFILE")]
    profile: Option<ProfileSelection>,

    /// Streams measured concurrently per group
    #[arg(short, long, env = "LOUDMON_GROUP_SIZE")]
    group_size: Option<usize>,

    /// Seconds to measure each stream
    #[arg(short, long, env = "LOUDMON_DURATION")]
    duration: Option<u64>,

    /// ffmpeg binary
    #[arg(long, env = "LOUDMON_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Collector endpoint URL
    #[arg(long, env = "API_ENDPOINT")]
    endpoint: Option<String>,

    /// Collector bearer token
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Averages below this many dB are too low
    #[arg(long, allow_negative_numbers = true)]
    too_low_below: Option<f64>,

    /// Averages above this many dB are too loud
    #[arg(long, allow_negative_numbers = true)]
    too_loud_above: Option<f64>,

    /// Load and list streams without measuring
    #[arg(long)]
    dry_run: bool,

    /// Write the resolved configuration (without token) to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            profile: self.profile,
            group_size: self.group_size,
            duration_secs: self.duration,
            ffmpeg_path: self.ffmpeg.clone(),
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            too_low_below_db: self.too_low_below,
            too_loud_above_db: self.too_loud_above,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_config: TomlConfig =
        load_toml_config(resolve_config_path(args.config.as_deref(), CONFIG_FILE_NAME))
            .context("Failed to load configuration file")?;
    let merged = file_config.with_overrides(args.overrides());

    init_tracing(&merged.logging)?;

    info!("Starting loudmon-analyzer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &args.write_config {
        write_toml_config(&merged.template(), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(());
    }

    let csv_path = match &args.csv {
        Some(path) => path.clone(),
        None => prompt_csv_path()?,
    };

    let profile = merged.profile();
    let descriptors = stream_source::load_descriptors(&csv_path, profile)?;

    if args.dry_run {
        info!("Dry run: {} streams loaded", descriptors.len());
        for (i, stream) in descriptors.iter().take(DRY_RUN_PREVIEW).enumerate() {
            info!("  {}. {}", i + 1, stream);
        }
        if descriptors.len() > DRY_RUN_PREVIEW {
            info!("  ... and {} more streams", descriptors.len() - DRY_RUN_PREVIEW);
        }
        return Ok(());
    }

    let config = AnalyzerConfig::from_toml(merged)?;
    info!(
        profile = ?config.profile,
        group_size = config.group_size,
        duration = ?config.duration_limit,
        too_low_below_db = config.thresholds.too_low_below_db,
        too_loud_above_db = config.thresholds.too_loud_above_db,
        "Configuration resolved"
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let scheduler = loudmon_analyzer::build_scheduler(&config)
        .await?
        .with_events(event_tx);

    let progress = tokio::spawn(log_progress(event_rx, descriptors.len(), config.group_size));

    let summary = scheduler.run(descriptors).await;
    drop(scheduler);
    let _ = progress.await;

    info!(
        "Run {} finished | Groups: {} | Attempted: {} | Measured: {} | Delivered: {} | Failed: {}",
        summary.run_id,
        summary.groups,
        summary.attempted,
        summary.measured,
        summary.delivered,
        summary.failed
    );

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. With `[logging] file` set,
/// output is appended there instead of stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

fn prompt_csv_path() -> Result<PathBuf> {
    print!("CSV path: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let path = line.trim();
    if path.is_empty() {
        bail!("No CSV path given");
    }
    Ok(PathBuf::from(path))
}

/// Log one line per finished group
async fn log_progress(
    mut events: mpsc::UnboundedReceiver<SchedulerEvent>,
    total_streams: usize,
    group_size: usize,
) {
    let started = Instant::now();
    let total_groups = total_streams.div_ceil(group_size);
    let mut finished = 0usize;
    let mut delivered = 0usize;

    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::StreamFinished { outcome, .. } => {
                finished += 1;
                if outcome.is_delivered() {
                    delivered += 1;
                }
            }
            SchedulerEvent::GroupCompleted { group, size } => {
                info!(
                    "Group {}/{} done ({} streams) | Progress: {}/{} ({:.0}%) | Delivered: {} | Elapsed: {}",
                    group,
                    total_groups,
                    size,
                    finished,
                    total_streams,
                    (finished as f64 / total_streams.max(1) as f64) * 100.0,
                    delivered,
                    loudmon_common::time::format_elapsed(started.elapsed())
                );
            }
            SchedulerEvent::StateChanged(_) => {}
        }
    }
}
