//! Integration tests for tick sources

use decay_window::feed::{BinanceBookTickerFeed, ReplayFeed, TickSource};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_binance_stream_url() {
    let feed = BinanceBookTickerFeed::new("BTCUSDT");
    assert_eq!(
        feed.ws_url(),
        "wss://fstream.binance.com/ws/btcusdt@bookTicker"
    );
}

#[tokio::test]
async fn test_replay_skips_malformed_lines() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"e":"bookTicker","E":1000,"s":"BTCUSDT","b":"100.5","a":"100.6"}}"#
    )
    .unwrap();
    writeln!(file, "garbage").unwrap();
    writeln!(file, r#"{{"e":"trade","E":1001,"s":"BTCUSDT"}}"#).unwrap();
    writeln!(
        file,
        r#"{{"e":"bookTicker","E":1002,"s":"BTCUSDT","b":"100.4","a":"100.7"}}"#
    )
    .unwrap();

    let feed = ReplayFeed::new(file.path());
    let mut rx = feed.subscribe().await.unwrap();

    let mut event_times = Vec::new();
    while let Some(tick) = rx.recv().await {
        event_times.push(tick.event_time);
    }

    assert_eq!(event_times, vec![1000, 1002]);
    assert_eq!(feed.stats().parsed(), 2);
    assert_eq!(feed.stats().malformed(), 2);
}

#[tokio::test]
async fn test_replay_missing_file() {
    let feed = ReplayFeed::new("/nonexistent/ticks.jsonl");
    assert!(feed.subscribe().await.is_err());
}
