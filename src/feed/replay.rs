//! Replay of captured book ticker frames
//!
//! Reads a file with one raw frame per line (as written by `capture`) and
//! emits the parsed ticks in file order. Blank lines are skipped; lines that
//! fail to parse are counted and dropped.

use super::{parse_book_ticker, FeedStats, Tick, TickSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Replays a capture file
pub struct ReplayFeed {
    path: PathBuf,
    stats: Arc<FeedStats>,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stats: Arc::new(FeedStats::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_reader(file: File, tick_tx: mpsc::Sender<Tick>, stats: Arc<FeedStats>) {
        let mut lines = BufReader::new(file).lines();
        let mut line_no: u64 = 0;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, line = line_no + 1, "Replay read failed");
                    break;
                }
            };
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match parse_book_ticker(trimmed) {
                Ok(tick) => {
                    stats.record_parsed();
                    if tick_tx.send(tick).await.is_err() {
                        tracing::debug!("Tick receiver dropped, stopping replay");
                        return;
                    }
                }
                Err(e) => stats.record_malformed(&e),
            }
        }

        tracing::info!(
            lines = line_no,
            parsed = stats.parsed(),
            malformed = stats.malformed(),
            "Replay finished"
        );
    }
}

#[async_trait]
impl TickSource for ReplayFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Tick>> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open replay file {:?}: {}", self.path, e))?;

        tracing::info!(path = ?self.path, "Replaying captured ticks");

        let (tick_tx, tick_rx) = mpsc::channel(1024);
        let stats = self.stats.clone();
        tokio::spawn(async move {
            Self::run_reader(file, tick_tx, stats).await;
        });

        Ok(tick_rx)
    }

    fn stats(&self) -> Arc<FeedStats> {
        self.stats.clone()
    }
}
