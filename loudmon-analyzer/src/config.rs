//! Configuration resolution for loudmon-analyzer
//!
//! Every value resolves with priority CLI flag → environment → TOML file →
//! built-in default. CLI and environment are merged by clap before they
//! reach [`ConfigOverrides`]; this module layers them over the TOML file and
//! validates the result into an immutable [`AnalyzerConfig`] that is built
//! once at startup and handed to the core.

use crate::models::ProfileSelection;
use crate::services::classifier::{Thresholds, DEFAULT_TOO_LOUD_ABOVE_DB, DEFAULT_TOO_LOW_BELOW_DB};
use crate::services::collector_client::{CollectorSettings, DEFAULT_TIMEOUT_SECS};
use crate::services::loudness_meter::{MeterSettings, DEFAULT_FFMPEG, DEFAULT_METER_WINDOW};
use crate::workflow::SchedulerSettings;
use loudmon_common::config::LoggingConfig;
use loudmon_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config file name looked up in the platform config dirs
pub const CONFIG_FILE_NAME: &str = "loudmon.toml";

/// Default per-stream measurement time
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Bootstrap configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub measurement: MeasurementSection,
    #[serde(default)]
    pub collector: CollectorSection,
    #[serde(default)]
    pub classification: ClassificationSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceSection {
    pub profile: Option<ProfileSelection>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SchedulerSection {
    pub group_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MeasurementSection {
    pub duration_secs: Option<u64>,
    pub ffmpeg_path: Option<PathBuf>,
    pub meter_window: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CollectorSection {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClassificationSection {
    pub too_low_below_db: Option<f64>,
    pub too_loud_above_db: Option<f64>,
}

/// Values supplied on the command line or via environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub profile: Option<ProfileSelection>,
    pub group_size: Option<usize>,
    pub duration_secs: Option<u64>,
    pub ffmpeg_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub too_low_below_db: Option<f64>,
    pub too_loud_above_db: Option<f64>,
}

impl TomlConfig {
    /// Layer overrides on top of file values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        fn layer<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        layer(&mut self.source.profile, overrides.profile);
        layer(&mut self.scheduler.group_size, overrides.group_size);
        layer(&mut self.measurement.duration_secs, overrides.duration_secs);
        layer(&mut self.measurement.ffmpeg_path, overrides.ffmpeg_path);
        layer(&mut self.collector.endpoint, overrides.endpoint);
        layer(&mut self.collector.token, overrides.token);
        layer(&mut self.classification.too_low_below_db, overrides.too_low_below_db);
        layer(&mut self.classification.too_loud_above_db, overrides.too_loud_above_db);
        self
    }

    pub fn profile(&self) -> ProfileSelection {
        self.source.profile.unwrap_or_default()
    }

    /// Fully populated copy for writing a config template
    ///
    /// Defaults are filled in and the bearer token is left out so the file
    /// can be shared.
    pub fn template(&self) -> Self {
        let profile = self.profile();
        Self {
            logging: self.logging.clone(),
            source: SourceSection {
                profile: Some(profile),
            },
            scheduler: SchedulerSection {
                group_size: Some(
                    self.scheduler
                        .group_size
                        .unwrap_or_else(|| profile.default_group_size()),
                ),
            },
            measurement: MeasurementSection {
                duration_secs: Some(self.measurement.duration_secs.unwrap_or(DEFAULT_DURATION_SECS)),
                ffmpeg_path: Some(
                    self.measurement
                        .ffmpeg_path
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
                ),
                meter_window: Some(self.measurement.meter_window.unwrap_or(DEFAULT_METER_WINDOW)),
            },
            collector: CollectorSection {
                endpoint: self.collector.endpoint.clone(),
                token: None,
                timeout_secs: Some(self.collector.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            },
            classification: ClassificationSection {
                too_low_below_db: Some(
                    self.classification
                        .too_low_below_db
                        .unwrap_or(DEFAULT_TOO_LOW_BELOW_DB),
                ),
                too_loud_above_db: Some(
                    self.classification
                        .too_loud_above_db
                        .unwrap_or(DEFAULT_TOO_LOUD_ABOVE_DB),
                ),
            },
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub profile: ProfileSelection,
    pub group_size: usize,
    pub duration_limit: Duration,
    pub meter: MeterSettings,
    pub collector: CollectorSettings,
    pub thresholds: Thresholds,
    pub logging: LoggingConfig,
}

impl AnalyzerConfig {
    /// Validate merged configuration
    ///
    /// # Errors
    /// `Error::Config` when the collector URL or token is missing or invalid,
    /// a count or duration is zero, or the threshold band is inverted.
    pub fn from_toml(config: TomlConfig) -> Result<Self> {
        let profile = config.profile();

        let group_size = config
            .scheduler
            .group_size
            .unwrap_or_else(|| profile.default_group_size());
        if group_size == 0 {
            return Err(Error::Config("Group size must be at least 1".to_string()));
        }

        let duration_secs = config
            .measurement
            .duration_secs
            .unwrap_or(DEFAULT_DURATION_SECS);
        if duration_secs == 0 {
            return Err(Error::Config(
                "Measurement duration must be at least 1 second".to_string(),
            ));
        }

        let meter_window = config.measurement.meter_window.unwrap_or(DEFAULT_METER_WINDOW);
        if meter_window == 0 {
            return Err(Error::Config("Meter window must be at least 1".to_string()));
        }

        let endpoint = config
            .collector
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Collector endpoint not configured. Set one of:\n\
                     1. --endpoint <url>\n\
                     2. Environment: API_ENDPOINT=<url>\n\
                     3. TOML config: [collector] endpoint = \"<url>\""
                        .to_string(),
                )
            })?;
        validate_endpoint(&endpoint)?;

        let token = config
            .collector
            .token
            .filter(|t| is_valid_token(t))
            .ok_or_else(|| {
                Error::Config(
                    "Collector token not configured. Set one of:\n\
                     1. --token <token>\n\
                     2. Environment: API_TOKEN=<token>\n\
                     3. TOML config: [collector] token = \"<token>\""
                        .to_string(),
                )
            })?;

        let timeout_secs = config.collector.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "Collector timeout must be at least 1 second".to_string(),
            ));
        }

        let thresholds = Thresholds::new(
            config
                .classification
                .too_low_below_db
                .unwrap_or(DEFAULT_TOO_LOW_BELOW_DB),
            config
                .classification
                .too_loud_above_db
                .unwrap_or(DEFAULT_TOO_LOUD_ABOVE_DB),
        )
        .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            profile,
            group_size,
            duration_limit: loudmon_common::time::secs_to_duration(duration_secs),
            meter: MeterSettings {
                program: config
                    .measurement
                    .ffmpeg_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
                meter_window,
            },
            collector: CollectorSettings {
                endpoint: endpoint.trim().to_string(),
                token: token.trim().to_string(),
                timeout: loudmon_common::time::secs_to_duration(timeout_secs),
            },
            thresholds,
            logging: config.logging,
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            group_size: self.group_size,
            duration_limit: self.duration_limit,
            thresholds: self.thresholds,
        }
    }
}

/// Token must be non-empty and non-whitespace
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = reqwest::Url::parse(endpoint.trim())
        .map_err(|e| Error::Config(format!("Invalid collector endpoint '{}': {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "Collector endpoint must be http or https, got '{}'",
            other
        ))),
    }
}
