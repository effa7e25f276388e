//! Parquet bucket sink
//!
//! Buffers records per symbol and writes one Parquet file per bucket each
//! rotation interval.

use super::bucket::{PartPaths, RotationPolicy};
use super::{RecordSink, SinkError};
use crate::aggregate::AggregateRecord;
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Aggregate record schema
pub fn aggregate_schema() -> Schema {
    Schema::new(vec![
        Field::new("symbol", DataType::Utf8, false),
        Field::new(
            "window_end",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new("best_bid", DataType::Float64, false),
        Field::new("best_ask", DataType::Float64, false),
    ])
}

/// Records waiting for the next rotation of one symbol
struct PendingBucket {
    opened_at: DateTime<Utc>,
    records: Vec<AggregateRecord>,
}

/// Bucketed, rotated Parquet output
pub struct ParquetBucketSink {
    output_dir: PathBuf,
    rotation: RotationPolicy,
    buckets: HashMap<String, PendingBucket>,
    next_seq: u64,
    files_finished: u64,
}

impl ParquetBucketSink {
    pub fn new(output_dir: impl Into<PathBuf>, rotation_interval_secs: u64) -> Self {
        Self {
            output_dir: output_dir.into(),
            rotation: RotationPolicy::new(rotation_interval_secs),
            buckets: HashMap::new(),
            next_seq: 0,
            files_finished: 0,
        }
    }

    /// Number of Parquet files finalized so far
    pub fn files_finished(&self) -> u64 {
        self.files_finished
    }

    fn write_file(path: &Path, records: &[AggregateRecord]) -> Result<(), SinkError> {
        let schema = Arc::new(aggregate_schema());
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        let window_ends: Vec<i64> = records.iter().map(|r| r.window_end).collect();
        let bids: Vec<f64> = records.iter().map(|r| r.best_bid).collect();
        let asks: Vec<f64> = records.iter().map(|r| r.best_ask).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(symbols)) as ArrayRef,
                Arc::new(TimestampMillisecondArray::from(window_ends).with_timezone("UTC"))
                    as ArrayRef,
                Arc::new(Float64Array::from(bids)) as ArrayRef,
                Arc::new(Float64Array::from(asks)) as ArrayRef,
            ],
        )?;

        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn write_part(paths: &PartPaths, records: &[AggregateRecord]) -> Result<(), SinkError> {
        if let Some(dir) = paths.in_progress.parent() {
            fs::create_dir_all(dir)?;
        }
        Self::write_file(&paths.in_progress, records)?;
        fs::rename(&paths.in_progress, &paths.finished)?;
        Ok(())
    }

    /// Write one bucket; on failure the bucket is put back for a later retry
    fn flush_bucket(&mut self, symbol: String, bucket: PendingBucket) -> Result<(), SinkError> {
        let paths = PartPaths::new(
            &self.output_dir,
            &symbol,
            bucket.opened_at,
            self.next_seq,
            "parquet",
        );

        let result = Self::write_part(&paths, &bucket.records);

        match result {
            Ok(()) => {
                self.next_seq += 1;
                self.files_finished += 1;
                tracing::info!(path = ?paths.finished, records = bucket.records.len(), "Finalized Parquet part");
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&paths.in_progress);
                self.buckets.insert(symbol, bucket);
                Err(e)
            }
        }
    }

    fn roll(&mut self, now: DateTime<Utc>, force: bool) -> Result<(), SinkError> {
        let due: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, b)| force || self.rotation.is_due(b.opened_at, now))
            .map(|(symbol, _)| symbol.clone())
            .collect();

        for symbol in due {
            if let Some(bucket) = self.buckets.remove(&symbol) {
                self.flush_bucket(symbol, bucket)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for ParquetBucketSink {
    fn name(&self) -> &'static str {
        "parquet"
    }

    async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        let now = Utc::now();
        self.buckets
            .entry(record.symbol.clone())
            .or_insert_with(|| PendingBucket {
                opened_at: now,
                records: Vec::new(),
            })
            .records
            .push(record.clone());
        Ok(())
    }

    async fn on_timer(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        self.roll(now, false)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.roll(Utc::now(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::TempDir;

    fn record(symbol: &str, window_end: i64) -> AggregateRecord {
        AggregateRecord {
            symbol: symbol.to_string(),
            window_end,
            best_bid: 1.5,
            best_ask: 2.5,
        }
    }

    #[test]
    fn test_schema_fields() {
        let schema = aggregate_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["symbol", "window_end", "best_bid", "best_ask"]);
    }

    #[tokio::test]
    async fn test_buckets_written_on_rotation() {
        let dir = TempDir::new().unwrap();
        let mut sink = ParquetBucketSink::new(dir.path(), 60);

        sink.consume(&record("BTCUSDT", 1000)).await.unwrap();
        sink.consume(&record("BTCUSDT", 2000)).await.unwrap();
        sink.consume(&record("ETHUSDT", 1000)).await.unwrap();

        sink.on_timer(Utc::now()).await.unwrap();
        assert_eq!(sink.files_finished(), 0);

        sink.on_timer(Utc::now() + Duration::seconds(61)).await.unwrap();
        assert_eq!(sink.files_finished(), 2);

        let btc: Vec<PathBuf> = fs::read_dir(dir.path().join("BTCUSDT"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].extension().unwrap(), "parquet");

        let reader = SerializedFileReader::new(File::open(&btc[0]).unwrap()).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);
    }

    #[tokio::test]
    async fn test_close_flushes_everything() {
        let dir = TempDir::new().unwrap();
        let mut sink = ParquetBucketSink::new(dir.path(), 3600);
        sink.consume(&record("BTCUSDT", 1000)).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(sink.files_finished(), 1);
        sink.close().await.unwrap();
        assert_eq!(sink.files_finished(), 1);
    }
}
