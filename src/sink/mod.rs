//! Output sinks
//!
//! Emitted records go to a bucketed, rotated file sink (CSV or Parquet) and
//! optionally to the console. File sinks are wrapped in a retry layer whose
//! exhaustion stops the pipeline.

mod bucket;
mod console;
mod csv;
mod parquet;
mod retry;
mod types;

pub use self::console::ConsoleSink;
pub use self::csv::CsvBucketSink;
pub use self::parquet::{aggregate_schema, ParquetBucketSink};
pub use self::retry::{RetryPolicy, RetryingSink};
pub use self::types::SinkError;

use crate::aggregate::AggregateRecord;
use crate::config::{SinkConfig, SinkFormat};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Trait for record sink implementations
#[async_trait]
pub trait RecordSink: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Accept one record
    async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError>;

    /// Periodic wall-clock hook used for rotation
    async fn on_timer(&mut self, _now: DateTime<Utc>) -> Result<(), SinkError> {
        Ok(())
    }

    /// Flush and finalize all output
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// Build the sinks selected by configuration
pub fn build_sinks(config: &SinkConfig) -> Vec<Box<dyn RecordSink>> {
    let file_sink: Box<dyn RecordSink> = match config.format {
        SinkFormat::Csv => Box::new(CsvBucketSink::new(
            config.output_path.clone(),
            config.rotation_interval_secs,
        )),
        SinkFormat::Parquet => Box::new(ParquetBucketSink::new(
            config.output_path.clone(),
            config.rotation_interval_secs,
        )),
    };

    let policy = RetryPolicy::new(
        config.max_retries,
        Duration::from_millis(config.retry_backoff_ms),
    );

    let mut sinks: Vec<Box<dyn RecordSink>> = vec![Box::new(RetryingSink::new(file_sink, policy))];
    if config.console {
        sinks.push(Box::new(ConsoleSink::new()));
    }
    sinks
}
