//! Tick types and parse errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A best bid/ask observation for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Trading symbol (e.g., "BTCUSDT"), the partition key
    pub symbol: String,
    /// Exchange event time in milliseconds since epoch
    pub event_time: i64,
    /// Best bid price
    pub bid_price: f64,
    /// Best ask price
    pub ask_price: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, event_time: i64, bid_price: f64, ask_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            event_time,
            bid_price,
            ask_price,
        }
    }
}

/// Reasons a raw line could not be turned into a [`Tick`]
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected event type: {0}")]
    UnexpectedEvent(String),

    #[error("Empty symbol")]
    EmptySymbol,

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Invalid {field} price: {value}")]
    InvalidPrice { field: &'static str, value: String },
}
