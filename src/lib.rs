//! decay-window: Streaming windowed decay aggregation of best bid/ask ticks
//!
//! This library provides the core components for:
//! - Book ticker feeds from Binance, live or replayed from a capture
//! - Per-symbol event-time watermarks with bounded lateness
//! - Keyed tumbling windows folded by an exponential decay recurrence
//! - Exactly one record per non-empty window
//! - Bucketed, rotated CSV and Parquet sinks with bounded retry
//! - Checkpoints of open windows and watermarks
//! - Logging and Prometheus metrics

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod feed;
pub mod pipeline;
pub mod sink;
pub mod telemetry;
pub mod ws;
