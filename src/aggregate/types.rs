//! Aggregation types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one tumbling window of one symbol
///
/// The interval is half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowId {
    pub symbol: String,
    pub start: i64,
    pub end: i64,
}

/// Decayed maxima for one closed window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub symbol: String,
    /// End of the window in milliseconds since epoch
    pub window_end: i64,
    pub best_bid: f64,
    pub best_ask: f64,
}

/// Which order buffered ticks are folded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldOrder {
    /// Order the ticks were accumulated in
    #[default]
    Arrival,
    /// Stable sort by event time before folding
    EventTime,
}

/// Invalid aggregation parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("half life must be positive, got {0} ms")]
    NonPositiveHalfLife(i64),

    #[error("sample period must be positive, got {0} ms")]
    NonPositiveSamplePeriod(i64),

    #[error("allowed lateness must not be negative, got {0} ms")]
    NegativeLateness(i64),
}
