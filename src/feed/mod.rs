//! Tick sources
//!
//! A live Binance book ticker feed and a replay feed over captured frames.
//! Both parse with the same function and drop malformed input after counting
//! it, so a bad line never ends the stream.

mod binance;
mod replay;
mod types;

pub use binance::{parse_book_ticker, BinanceBookTickerFeed};
pub use replay::ReplayFeed;
pub use types::{ParseError, Tick};

use crate::config::{Config, SourceKind};
use crate::telemetry::{increment, CounterMetric};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Trait for tick source implementations
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Start producing ticks; the channel closes when the source is exhausted
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Tick>>;

    /// Parse counters shared with the producing task
    fn stats(&self) -> Arc<FeedStats>;
}

/// Parse counters of a source
#[derive(Debug, Default)]
pub struct FeedStats {
    parsed: AtomicU64,
    malformed: AtomicU64,
}

impl FeedStats {
    pub fn record_parsed(&self) {
        self.parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self, error: &ParseError) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        increment(CounterMetric::TicksMalformed);
        tracing::debug!(error = %error, "Dropping malformed tick");
    }

    pub fn parsed(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Build the source selected by configuration
pub fn build_source(config: &Config) -> anyhow::Result<Box<dyn TickSource>> {
    match config.source.kind {
        SourceKind::Live => Ok(Box::new(BinanceBookTickerFeed::new(
            config.pipeline.symbol.clone(),
        ))),
        SourceKind::Replay => {
            let path = config
                .source
                .replay_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source.replay_path is not set"))?;
            Ok(Box::new(ReplayFeed::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_stats_counts() {
        let stats = FeedStats::default();
        stats.record_parsed();
        stats.record_parsed();
        stats.record_malformed(&ParseError::EmptySymbol);
        assert_eq!(stats.parsed(), 2);
        assert_eq!(stats.malformed(), 1);
    }

    #[test]
    fn test_build_source_replay_without_path() {
        let mut config = Config::from_toml(
            r#"
            [pipeline]
            symbol = "BTCUSDT"
            half_life_ms = 1000
            sample_period_ms = 5000

            [sink]
            output_path = "./output"
        "#,
        )
        .unwrap();
        assert!(build_source(&config).is_ok());

        config.source.kind = SourceKind::Replay;
        assert!(build_source(&config).is_err());
    }
}
