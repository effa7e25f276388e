//! End-to-end replay tests

use decay_window::cli::run_pipeline;
use decay_window::config::Config;
use decay_window::pipeline::StopReason;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;

fn frame(symbol: &str, event_time: i64, bid: &str, ask: &str) -> String {
    format!(
        r#"{{"e":"bookTicker","u":1,"E":{event_time},"T":{event_time},"s":"{symbol}","b":"{bid}","B":"1","a":"{ask}","A":"1"}}"#
    )
}

fn config(input: &Path, output: &Path, format: &str) -> Config {
    Config::from_toml(&format!(
        r#"
        [pipeline]
        symbol = "BTCUSDT"
        half_life_ms = 1000
        sample_period_ms = 1000
        allowed_lateness_ms = 0

        [source]
        kind = "replay"
        replay_path = "{}"

        [sink]
        output_path = "{}"
        format = "{format}"
        rotation_interval_secs = 3600
        max_retries = 0
        "#,
        input.display(),
        output.display()
    ))
    .unwrap()
}

/// Lines of every finished CSV part under `dir`, in file-name order
fn csv_lines(dir: &Path) -> Vec<String> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    paths
        .iter()
        .flat_map(|p| {
            fs::read_to_string(p)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn write_capture(dir: &Path) -> std::path::PathBuf {
    let lines = [
        frame("BTCUSDT", 100, "10", "20"),
        frame("BTCUSDT", 100, "12", "22"),
        frame("ETHUSDT", 200, "5", "6"),
        "not json".to_string(),
        frame("BTCUSDT", 1_500, "1", "2"),
        // window [0, 1000) already closed for BTCUSDT
        frame("BTCUSDT", 900, "99", "99"),
    ];
    let path = dir.join("ticks.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[tokio::test]
async fn test_replay_to_csv() {
    let dir = TempDir::new().unwrap();
    let input = write_capture(dir.path());
    let output = dir.path().join("out");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = run_pipeline(&config(&input, &output, "csv"), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::SourceExhausted);
    assert_eq!(report.stats.ticks_received, 5);
    assert_eq!(report.stats.late_dropped, 1);
    assert_eq!(report.stats.records_emitted, 3);

    assert_eq!(
        csv_lines(&output.join("BTCUSDT")),
        vec!["BTCUSDT,1000,12,22", "BTCUSDT,2000,0,0"]
    );
    assert_eq!(csv_lines(&output.join("ETHUSDT")), vec!["ETHUSDT,1000,0,0"]);

    // no in-progress files survive a clean finish
    let hidden = fs::read_dir(output.join("BTCUSDT"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with('.')
        })
        .count();
    assert_eq!(hidden, 0);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let input = write_capture(dir.path());

    let mut runs = Vec::new();
    for name in ["a", "b"] {
        let output = dir.path().join(name);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        run_pipeline(&config(&input, &output, "csv"), shutdown_rx)
            .await
            .unwrap();
        runs.push(csv_lines(&output.join("BTCUSDT")));
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_replay_to_parquet() {
    let dir = TempDir::new().unwrap();
    let input = write_capture(dir.path());
    let output = dir.path().join("out");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    run_pipeline(&config(&input, &output, "parquet"), shutdown_rx)
        .await
        .unwrap();

    let parts: Vec<_> = fs::read_dir(output.join("BTCUSDT"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].extension().unwrap(), "parquet");
}
