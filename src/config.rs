//! Configuration types for decay-window

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregate::{AggregationError, FoldOrder};
use crate::telemetry::LogFormat;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Aggregation settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Symbol subscribed to by the live feed
    pub symbol: String,

    /// Decay half life (milliseconds, > 0)
    pub half_life_ms: i64,

    /// Tumbling window length (milliseconds, > 0)
    pub sample_period_ms: i64,

    /// Bounded out-of-order allowance subtracted from the max event time
    #[serde(default = "default_allowed_lateness")]
    pub allowed_lateness_ms: i64,

    /// Fold buffers in arrival order or sorted by event time
    #[serde(default)]
    pub fold_order: FoldOrder,
}

fn default_allowed_lateness() -> i64 {
    3000
}

/// Tick source configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// File of captured raw lines (required for `replay`)
    pub replay_path: Option<PathBuf>,
}

/// Where ticks come from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Live,
    Replay,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Root directory; one bucket directory per symbol is created below it
    pub output_path: PathBuf,

    #[serde(default)]
    pub format: SinkFormat,

    /// Wall-clock interval after which each bucket's file is finalized
    #[serde(default = "default_rotation_interval")]
    pub rotation_interval_secs: u64,

    /// Also print every record to stdout
    #[serde(default)]
    pub console: bool,

    /// Attempts after the first failed write before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between write attempts, doubled each retry
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_rotation_interval() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_backoff() -> u64 {
    100
}

/// Output file format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    #[default]
    Csv,
    Parquet,
}

/// Driver state snapshotting
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    /// Snapshot interval in milliseconds (0 disables checkpointing)
    #[serde(default = "default_checkpoint_interval")]
    pub interval_ms: u64,

    /// Checkpoint file; defaults to `<output_path>/_checkpoint.json`
    pub path: Option<PathBuf>,
}

fn default_checkpoint_interval() -> u64 {
    10_000
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_checkpoint_interval(),
            path: None,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

/// Configuration failures, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid pipeline settings: {0}")]
    Pipeline(#[from] AggregationError),

    #[error("pipeline.symbol must not be empty")]
    EmptySymbol,

    #[error("source.replay_path is required for replay sources")]
    MissingReplayPath,

    #[error("sink.rotation_interval_secs must be positive")]
    ZeroRotationInterval,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if p.half_life_ms <= 0 {
            return Err(AggregationError::NonPositiveHalfLife(p.half_life_ms).into());
        }
        if p.sample_period_ms <= 0 {
            return Err(AggregationError::NonPositiveSamplePeriod(p.sample_period_ms).into());
        }
        if p.allowed_lateness_ms < 0 {
            return Err(AggregationError::NegativeLateness(p.allowed_lateness_ms).into());
        }
        if self.source.kind == SourceKind::Replay && self.source.replay_path.is_none() {
            return Err(ConfigError::MissingReplayPath);
        }
        if self.sink.rotation_interval_secs == 0 {
            return Err(ConfigError::ZeroRotationInterval);
        }
        Ok(())
    }

    /// Resolved checkpoint file, or `None` when checkpointing is disabled
    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        if self.checkpoint.interval_ms == 0 {
            return None;
        }
        Some(
            self.checkpoint
                .path
                .clone()
                .unwrap_or_else(|| self.sink.output_path.join("_checkpoint.json")),
        )
    }
}
