//! Integration tests for configuration loading

use decay_window::aggregate::FoldOrder;
use decay_window::config::{Config, SinkFormat, SourceKind};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_example_config_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(include_str!("../../config.toml.example").as_bytes())
        .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.pipeline.symbol, "BTCUSDT");
    assert_eq!(config.pipeline.fold_order, FoldOrder::Arrival);
    assert_eq!(config.source.kind, SourceKind::Live);
    assert_eq!(config.sink.format, SinkFormat::Csv);
    assert!(config.checkpoint_path().is_some());
}

#[test]
fn test_missing_file_is_an_error() {
    tokio_test::assert_err!(Config::load("/nonexistent/decay-window.toml"));
}

#[test]
fn test_invalid_pipeline_settings_are_rejected() {
    let toml = r#"
        [pipeline]
        symbol = "BTCUSDT"
        half_life_ms = 1000
        sample_period_ms = 0

        [sink]
        output_path = "./output"
    "#;
    tokio_test::assert_err!(Config::from_toml(toml));
}
