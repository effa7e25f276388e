//! Window lifecycle driver
//!
//! Owns one partition per symbol. Each partition has its own watermark and an
//! arena of open window buffers keyed by window start. A window moves through
//! absent -> open -> closed:
//!
//! - the first tick assigned to `(symbol, start)` opens its buffer
//! - later ticks append in arrival order
//! - once the partition watermark reaches the window end the buffer is
//!   removed, folded once and emitted once
//!
//! A tick whose window has already closed is dropped and counted. A tick
//! behind the watermark whose window is still open is folded in.

use std::collections::BTreeMap;

use crate::aggregate::{
    AggregateRecord, AggregationError, DecayAggregator, WatermarkTracker, WindowAssigner,
};
use crate::config::PipelineConfig;
use crate::feed::Tick;
use crate::telemetry::{increment, increment_by, set_gauge, CounterMetric, GaugeMetric};

use super::checkpoint::{DriverSnapshot, PartitionSnapshot, WindowSnapshot};

/// Counters kept by the driver
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks_received: u64,
    pub late_included: u64,
    pub late_dropped: u64,
    pub out_of_range: u64,
    pub records_emitted: u64,
}

/// Per-symbol state
#[derive(Debug)]
struct Partition {
    watermark: WatermarkTracker,
    windows: BTreeMap<i64, Vec<Tick>>,
}

impl Partition {
    fn new(allowed_lateness: i64) -> Self {
        Self {
            watermark: WatermarkTracker::new(allowed_lateness),
            windows: BTreeMap::new(),
        }
    }

    /// Remove every window whose end is at or behind `watermark`, oldest first
    fn take_closed(&mut self, assigner: &WindowAssigner, watermark: i64) -> Vec<(i64, Vec<Tick>)> {
        let mut closed = Vec::new();
        while let Some((&start, _)) = self.windows.first_key_value() {
            match assigner.window_end(start) {
                Some(end) if end <= watermark => {}
                _ => break,
            }
            if let Some(entry) = self.windows.pop_first() {
                closed.push(entry);
            }
        }
        closed
    }
}

/// Routes ticks into windows and closes them as watermarks advance
pub struct PipelineDriver {
    assigner: WindowAssigner,
    aggregator: DecayAggregator,
    allowed_lateness: i64,
    partitions: BTreeMap<String, Partition>,
    stats: DriverStats,
}

impl PipelineDriver {
    /// Build a driver from validated pipeline settings
    pub fn new(config: &PipelineConfig) -> Result<Self, AggregationError> {
        if config.allowed_lateness_ms < 0 {
            return Err(AggregationError::NegativeLateness(config.allowed_lateness_ms));
        }

        Ok(Self {
            assigner: WindowAssigner::new(config.sample_period_ms)?,
            aggregator: DecayAggregator::new(config.half_life_ms, config.fold_order)?,
            allowed_lateness: config.allowed_lateness_ms,
            partitions: BTreeMap::new(),
            stats: DriverStats::default(),
        })
    }

    /// Ingest one tick and return the records of any windows it closed
    pub fn on_tick(&mut self, tick: Tick) -> Vec<AggregateRecord> {
        self.stats.ticks_received += 1;
        increment(CounterMetric::TicksReceived);

        let Some(id) = self.assigner.assign(&tick) else {
            self.stats.out_of_range += 1;
            increment(CounterMetric::TicksOutOfRange);
            tracing::warn!(
                symbol = %tick.symbol,
                event_time = tick.event_time,
                "Dropping tick with unrepresentable window"
            );
            return Vec::new();
        };
        let allowed_lateness = self.allowed_lateness;
        let partition = self
            .partitions
            .entry(id.symbol.clone())
            .or_insert_with(|| Partition::new(allowed_lateness));

        let watermark = partition.watermark.current();
        if id.end <= watermark {
            self.stats.late_dropped += 1;
            increment(CounterMetric::TicksLateDropped);
            tracing::debug!(
                symbol = %id.symbol,
                event_time = tick.event_time,
                window_end = id.end,
                watermark,
                "Dropping tick for closed window"
            );
            return Vec::new();
        }

        if partition.watermark.is_late(tick.event_time) {
            self.stats.late_included += 1;
            increment(CounterMetric::TicksLateIncluded);
        }

        let event_time = tick.event_time;
        partition.windows.entry(id.start).or_default().push(tick);

        let watermark = partition.watermark.observe(event_time);
        let closed = partition.take_closed(&self.assigner, watermark);

        let records = self.emit(&id.symbol, closed);
        self.report_open_windows();
        records
    }

    /// Close every open window, as if the watermark jumped to the end of time
    ///
    /// Used when a bounded source is exhausted.
    pub fn finish(&mut self) -> Vec<AggregateRecord> {
        let mut records = Vec::new();
        let symbols: Vec<String> = self.partitions.keys().cloned().collect();

        for symbol in symbols {
            let closed = match self.partitions.get_mut(&symbol) {
                Some(partition) => std::mem::take(&mut partition.windows).into_iter().collect(),
                None => continue,
            };
            records.extend(self.emit(&symbol, closed));
        }

        self.report_open_windows();
        records
    }

    /// Drop every open window without emitting; returns how many were dropped
    pub fn discard_open(&mut self) -> usize {
        let count = self.open_windows();
        for partition in self.partitions.values_mut() {
            partition.windows.clear();
        }
        if count > 0 {
            increment_by(CounterMetric::WindowsDiscarded, count as u64);
        }
        self.report_open_windows();
        count
    }

    fn emit(&mut self, symbol: &str, closed: Vec<(i64, Vec<Tick>)>) -> Vec<AggregateRecord> {
        let mut records = Vec::with_capacity(closed.len());

        for (start, ticks) in closed {
            // Buffered starts always come from `assign`, so the end exists.
            let Some(window_end) = self.assigner.window_end(start) else {
                continue;
            };
            // Empty buffers produce no record.
            let Some(quote) = self.aggregator.aggregate(&ticks) else {
                continue;
            };

            self.stats.records_emitted += 1;
            increment(CounterMetric::RecordsEmitted);
            tracing::debug!(
                symbol,
                window_end,
                ticks = ticks.len(),
                best_bid = quote.best_bid,
                best_ask = quote.best_ask,
                "Window closed"
            );
            records.push(AggregateRecord {
                symbol: symbol.to_string(),
                window_end,
                best_bid: quote.best_bid,
                best_ask: quote.best_ask,
            });
        }

        records
    }

    fn report_open_windows(&self) {
        set_gauge(GaugeMetric::OpenWindows, self.open_windows() as f64);
    }

    /// Number of open window buffers across all symbols
    pub fn open_windows(&self) -> usize {
        self.partitions.values().map(|p| p.windows.len()).sum()
    }

    /// Current watermark of a symbol, if it has seen any tick
    pub fn watermark(&self, symbol: &str) -> Option<i64> {
        self.partitions
            .get(symbol)
            .filter(|p| p.watermark.max_seen().is_some())
            .map(|p| p.watermark.current())
    }

    /// Counters since construction
    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Capture watermarks and open buffers
    pub fn snapshot(&self) -> DriverSnapshot {
        let partitions = self
            .partitions
            .iter()
            .map(|(symbol, partition)| PartitionSnapshot {
                symbol: symbol.clone(),
                max_seen: partition.watermark.max_seen(),
                windows: partition
                    .windows
                    .iter()
                    .map(|(start, ticks)| WindowSnapshot {
                        start: *start,
                        ticks: ticks.clone(),
                    })
                    .collect(),
            })
            .collect();

        DriverSnapshot { partitions }
    }

    /// Replace all partition state with a snapshot
    pub fn restore(&mut self, snapshot: DriverSnapshot) {
        self.partitions.clear();
        let assigner = self.assigner;

        for partition in snapshot.partitions {
            let windows = partition
                .windows
                .into_iter()
                .filter(|w| assigner.window_end(w.start).is_some())
                .map(|w| (w.start, w.ticks))
                .collect();
            self.partitions.insert(
                partition.symbol,
                Partition {
                    watermark: WatermarkTracker::with_max_seen(
                        self.allowed_lateness,
                        partition.max_seen,
                    ),
                    windows,
                },
            );
        }

        self.report_open_windows();
    }
}
