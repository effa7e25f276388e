//! Delimited-text bucket sink
//!
//! Appends `symbol,window_end,best_bid,best_ask` rows to one in-progress file
//! per symbol and finalizes it every rotation interval. A part that fails to
//! finalize stays open and is retried on the next roll.

use super::bucket::{PartPaths, RotationPolicy};
use super::{RecordSink, SinkError};
use crate::aggregate::AggregateRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Encode one record as a newline-terminated CSV row
pub fn encode_record(record: &AggregateRecord) -> Result<Vec<u8>, SinkError> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record([
        record.symbol.clone(),
        record.window_end.to_string(),
        record.best_bid.to_string(),
        record.best_ask.to_string(),
    ])?;

    writer
        .into_inner()
        .map_err(|e| SinkError::Io(e.into_error()))
}

/// Output that can be cut back to a known length
trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// Append `row` after `committed` bytes; on failure exactly `committed` bytes remain
fn append_row<W: Write + Truncate>(out: &mut W, committed: &mut u64, row: &[u8]) -> io::Result<()> {
    if let Err(e) = out.write_all(row) {
        out.truncate_to(*committed)?;
        return Err(e);
    }
    *committed += row.len() as u64;
    Ok(())
}

/// An open part file
struct OpenPart {
    paths: PartPaths,
    file: File,
    opened_at: DateTime<Utc>,
    /// Bytes known to hold complete rows
    committed_len: u64,
    records: u64,
}

/// Bucketed, rotated CSV output
pub struct CsvBucketSink {
    output_dir: PathBuf,
    rotation: RotationPolicy,
    parts: HashMap<String, OpenPart>,
    next_seq: u64,
    files_finished: u64,
}

impl CsvBucketSink {
    pub fn new(output_dir: impl Into<PathBuf>, rotation_interval_secs: u64) -> Self {
        Self {
            output_dir: output_dir.into(),
            rotation: RotationPolicy::new(rotation_interval_secs),
            parts: HashMap::new(),
            next_seq: 0,
            files_finished: 0,
        }
    }

    /// Number of part files finalized so far
    pub fn files_finished(&self) -> u64 {
        self.files_finished
    }

    fn open_part(&mut self, symbol: &str, now: DateTime<Utc>) -> Result<OpenPart, SinkError> {
        let paths = PartPaths::new(&self.output_dir, symbol, now, self.next_seq, "csv");
        self.next_seq += 1;

        if let Some(dir) = paths.in_progress.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&paths.in_progress)?;

        tracing::debug!(symbol, path = ?paths.in_progress, "Opened CSV part");
        Ok(OpenPart {
            paths,
            file,
            opened_at: now,
            committed_len: 0,
            records: 0,
        })
    }

    /// Finalize the part of `symbol`; it is only forgotten once the rename succeeded
    fn finish_part(&mut self, symbol: &str) -> Result<(), SinkError> {
        let Some(part) = self.parts.get(symbol) else {
            return Ok(());
        };
        part.file.sync_all()?;
        fs::rename(&part.paths.in_progress, &part.paths.finished)?;

        if let Some(part) = self.parts.remove(symbol) {
            self.files_finished += 1;
            tracing::info!(path = ?part.paths.finished, records = part.records, "Finalized CSV part");
        }
        Ok(())
    }

    /// Finalize every part that is due at `now` (or all of them when `force`)
    fn roll(&mut self, now: DateTime<Utc>, force: bool) -> Result<(), SinkError> {
        let due: Vec<String> = self
            .parts
            .iter()
            .filter(|(_, p)| force || self.rotation.is_due(p.opened_at, now))
            .map(|(symbol, _)| symbol.clone())
            .collect();

        for symbol in due {
            self.finish_part(&symbol)?;
        }
        Ok(())
    }

    fn write_at(&mut self, record: &AggregateRecord, now: DateTime<Utc>) -> Result<(), SinkError> {
        let expired = self
            .parts
            .get(&record.symbol)
            .is_some_and(|part| self.rotation.is_due(part.opened_at, now));
        if expired {
            self.finish_part(&record.symbol)?;
        }

        if !self.parts.contains_key(&record.symbol) {
            let part = self.open_part(&record.symbol, now)?;
            self.parts.insert(record.symbol.clone(), part);
        }

        let Some(part) = self.parts.get_mut(&record.symbol) else {
            return Ok(());
        };

        let row = encode_record(record)?;
        append_row(&mut part.file, &mut part.committed_len, &row)?;
        part.records += 1;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for CsvBucketSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        self.write_at(record, Utc::now())
    }

    async fn on_timer(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        self.roll(now, false)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.roll(Utc::now(), true)
    }
}
