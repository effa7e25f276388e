//! Async pipeline loop
//!
//! Pulls ticks from a source channel into the [`PipelineDriver`], forwards
//! closed-window records to every sink and drives the wall-clock timers for
//! sink rotation and checkpoints.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::aggregate::AggregateRecord;
use crate::config::{Config, SourceKind};
use crate::feed::Tick;
use crate::sink::{build_sinks, RecordSink, SinkError};

use super::checkpoint::{CheckpointError, CheckpointStore};
use super::driver::{DriverStats, PipelineDriver};

/// How often sinks get a chance to rotate
const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Why the pipeline loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source channel closed; open windows were emitted
    SourceExhausted,
    /// A shutdown was requested; open windows were discarded
    Shutdown,
}

/// Summary returned when the pipeline stops
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stop_reason: StopReason,
    pub stats: DriverStats,
    pub windows_discarded: usize,
}

/// Source-to-sink pipeline
pub struct Pipeline {
    driver: PipelineDriver,
    sinks: Vec<Box<dyn RecordSink>>,
    checkpoint: Option<(CheckpointStore, Duration)>,
}

impl Pipeline {
    pub fn new(driver: PipelineDriver, sinks: Vec<Box<dyn RecordSink>>) -> Self {
        Self {
            driver,
            sinks,
            checkpoint: None,
        }
    }

    /// Snapshot driver state to `store` every `interval`
    pub fn with_checkpoint(mut self, store: CheckpointStore, interval: Duration) -> Self {
        self.checkpoint = Some((store, interval));
        self
    }

    /// Build driver, sinks and checkpointing from configuration
    ///
    /// Checkpoints are only used with the live source; a replay always
    /// recomputes from the start of its file.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let driver = PipelineDriver::new(&config.pipeline)?;
        let mut pipeline = Self::new(driver, build_sinks(&config.sink));

        if config.source.kind == SourceKind::Live {
            if let Some(path) = config.checkpoint_path() {
                let store = CheckpointStore::new(path);
                pipeline =
                    pipeline.with_checkpoint(store, Duration::from_millis(config.checkpoint.interval_ms));
                pipeline.restore()?;
            }
        }

        Ok(pipeline)
    }

    /// Restore driver state from the configured checkpoint, if one exists
    pub fn restore(&mut self) -> Result<bool, CheckpointError> {
        let Some((store, _)) = &self.checkpoint else {
            return Ok(false);
        };

        match store.load()? {
            Some(snapshot) => {
                self.driver.restore(snapshot);
                tracing::info!(open_windows = self.driver.open_windows(), "Resumed from checkpoint");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Driver being fed by this pipeline
    pub fn driver(&self) -> &PipelineDriver {
        &self.driver
    }

    /// Run until the source is exhausted or `shutdown` flips to `true`
    ///
    /// A sink that exhausts its retries ends the run with an error.
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<PipelineReport> {
        let mut rotation = interval(ROTATION_CHECK_INTERVAL);
        rotation.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let checkpoint_period = self
            .checkpoint
            .as_ref()
            .map(|(_, period)| *period)
            .unwrap_or(Duration::from_secs(3600));
        let mut checkpoint_timer = interval_at(Instant::now() + checkpoint_period, checkpoint_period);
        checkpoint_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(sinks = self.sinks.len(), "Pipeline started");

        let stop_reason = loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break StopReason::Shutdown;
                    }
                }

                tick = ticks.recv() => match tick {
                    Some(tick) => {
                        let records = self.driver.on_tick(tick);
                        self.emit(&records).await?;
                    }
                    None => break StopReason::SourceExhausted,
                },

                _ = rotation.tick() => {
                    let now = Utc::now();
                    for sink in self.sinks.iter_mut() {
                        sink.on_timer(now).await?;
                    }
                }

                _ = checkpoint_timer.tick(), if self.checkpoint.is_some() => {
                    self.save_checkpoint();
                }
            }
        };

        let windows_discarded = match stop_reason {
            StopReason::SourceExhausted => {
                tracing::info!("Source exhausted, closing remaining windows");
                let records = self.driver.finish();
                self.emit(&records).await?;
                0
            }
            StopReason::Shutdown => {
                tracing::info!("Shutdown requested");
                self.save_checkpoint();
                let discarded = self.driver.discard_open();
                if discarded > 0 {
                    tracing::info!(windows = discarded, "Discarded open windows");
                }
                discarded
            }
        };

        self.close_sinks().await?;

        let stats = self.driver.stats().clone();
        tracing::info!(
            ?stop_reason,
            ticks = stats.ticks_received,
            records = stats.records_emitted,
            late_included = stats.late_included,
            late_dropped = stats.late_dropped,
            "Pipeline stopped"
        );

        Ok(PipelineReport {
            stop_reason,
            stats,
            windows_discarded,
        })
    }

    async fn emit(&mut self, records: &[AggregateRecord]) -> Result<(), SinkError> {
        for record in records {
            for sink in self.sinks.iter_mut() {
                sink.consume(record).await?;
            }
        }
        Ok(())
    }

    async fn close_sinks(&mut self) -> Result<(), SinkError> {
        for sink in self.sinks.iter_mut() {
            sink.close().await?;
            tracing::debug!(sink = sink.name(), "Sink closed");
        }
        Ok(())
    }

    fn save_checkpoint(&self) {
        let Some((store, _)) = &self.checkpoint else {
            return;
        };

        if let Err(e) = store.save(&self.driver.snapshot()) {
            tracing::warn!(error = %e, path = ?store.path(), "Failed to write checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FoldOrder;
    use crate::config::PipelineConfig;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingSink {
        records: Arc<Mutex<Vec<AggregateRecord>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl RecordSink for BrokenSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn consume(&mut self, _record: &AggregateRecord) -> Result<(), SinkError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn driver() -> PipelineDriver {
        PipelineDriver::new(&PipelineConfig {
            symbol: "BTCUSDT".to_string(),
            half_life_ms: 1000,
            sample_period_ms: 1000,
            allowed_lateness_ms: 0,
            fold_order: FoldOrder::Arrival,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_source_exhaustion_emits_open_windows() {
        let sink = RecordingSink::default();
        let pipeline = Pipeline::new(driver(), vec![Box::new(sink.clone())]);

        let (tick_tx, tick_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tick_tx.send(Tick::new("A", 100, 10.0, 20.0)).await.unwrap();
        tick_tx.send(Tick::new("A", 100, 12.0, 22.0)).await.unwrap();
        tick_tx.send(Tick::new("A", 1_500, 1.0, 1.0)).await.unwrap();
        drop(tick_tx);

        let report = pipeline.run(tick_rx, shutdown_rx).await.unwrap();
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.windows_discarded, 0);
        assert_eq!(report.stats.ticks_received, 3);

        let records = sink.records.lock().unwrap().clone();
        let ends: Vec<i64> = records.iter().map(|r| r.window_end).collect();
        assert_eq!(ends, vec![1000, 2000]);
        assert_eq!(records[0].best_bid, 12.0);
        assert_eq!(records[0].best_ask, 22.0);
        assert!(*sink.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_discards_open_windows_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        let sink = RecordingSink::default();
        let pipeline = Pipeline::new(driver(), vec![Box::new(sink.clone())])
            .with_checkpoint(store.clone(), Duration::from_secs(3600));

        let (tick_tx, tick_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(pipeline.run(tick_rx, shutdown_rx));

        tick_tx.send(Tick::new("A", 100, 1.0, 1.0)).await.unwrap();
        tick_tx.send(Tick::new("A", 1_100, 1.0, 1.0)).await.unwrap();

        // wait for the first window to be emitted
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.records.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first window was not emitted");

        shutdown_tx.send(true).unwrap();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.stop_reason, StopReason::Shutdown);
        assert_eq!(report.windows_discarded, 1);
        assert_eq!(sink.records.lock().unwrap().len(), 1);
        assert!(*sink.closed.lock().unwrap());

        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.partitions.len(), 1);
        assert_eq!(snapshot.partitions[0].windows.len(), 1);
        assert_eq!(snapshot.partitions[0].windows[0].start, 1_000);

        // a restarted pipeline picks the open window back up
        let sink = RecordingSink::default();
        let mut resumed = Pipeline::new(driver(), vec![Box::new(sink.clone())])
            .with_checkpoint(store, Duration::from_secs(3600));
        assert!(resumed.restore().unwrap());
        assert_eq!(resumed.driver().open_windows(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_stops_pipeline() {
        let pipeline = Pipeline::new(driver(), vec![Box::new(BrokenSink)]);
        let (tick_tx, tick_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tick_tx.send(Tick::new("A", 100, 1.0, 1.0)).await.unwrap();
        tick_tx.send(Tick::new("A", 1_100, 1.0, 1.0)).await.unwrap();

        let result = pipeline.run(tick_rx, shutdown_rx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_restore_without_checkpoint_configured() {
        let mut pipeline = Pipeline::new(driver(), Vec::new());
        assert!(!pipeline.restore().unwrap());
    }
}
