//! Binance book ticker feed
//!
//! Streams best bid/ask updates from the USD-M futures `<symbol>@bookTicker`
//! stream. Event time is the exchange `E` field.

use super::{FeedStats, ParseError, Tick, TickSource};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Binance futures WebSocket base URL
const BINANCE_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Binance bookTicker message structure
#[derive(Debug, Deserialize)]
struct BookTickerMessage {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,
    /// Event time (milliseconds)
    #[serde(rename = "E")]
    event_time: i64,
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    /// Best bid price
    #[serde(rename = "b")]
    bid_price: String,
    /// Best ask price
    #[serde(rename = "a")]
    ask_price: String,
}

/// Parse one raw bookTicker frame into a [`Tick`]
///
/// Shared by the live feed and by replay of captured frames.
pub fn parse_book_ticker(raw: &str) -> Result<Tick, ParseError> {
    let msg: BookTickerMessage = serde_json::from_str(raw)?;

    if msg.event_type != "bookTicker" {
        return Err(ParseError::UnexpectedEvent(msg.event_type));
    }
    if msg.symbol.is_empty() {
        return Err(ParseError::EmptySymbol);
    }
    if !msg.symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ParseError::InvalidSymbol(msg.symbol));
    }

    Ok(Tick {
        symbol: msg.symbol,
        event_time: msg.event_time,
        bid_price: parse_price("bid", &msg.bid_price)?,
        ask_price: parse_price("ask", &msg.ask_price)?,
    })
}

fn parse_price(field: &'static str, value: &str) -> Result<f64, ParseError> {
    match value.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(ParseError::InvalidPrice {
            field,
            value: value.to_string(),
        }),
    }
}

/// Live book ticker feed for a single symbol
pub struct BinanceBookTickerFeed {
    symbol: String,
    stats: Arc<FeedStats>,
}

impl BinanceBookTickerFeed {
    /// Create a new feed for the given symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_lowercase(),
            stats: Arc::new(FeedStats::default()),
        }
    }

    /// Build the WebSocket URL for the book ticker stream
    pub fn ws_url(&self) -> String {
        format!("{}/{}@bookTicker", BINANCE_WS_URL, self.symbol)
    }

    /// Client configuration: reconnect forever, the pipeline must outlive outages
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(self.ws_url())
            .max_reconnects(0)
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .ping_interval(Duration::from_secs(30))
    }

    /// Parse and forward text frames until the client or the receiver goes away
    async fn run_message_loop(
        mut ws_rx: mpsc::Receiver<WsMessage>,
        tick_tx: mpsc::Sender<Tick>,
        stats: Arc<FeedStats>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => match parse_book_ticker(&text) {
                    Ok(tick) => {
                        stats.record_parsed();
                        if tick_tx.send(tick).await.is_err() {
                            tracing::debug!("Tick receiver dropped, stopping feed");
                            break;
                        }
                    }
                    Err(e) => stats.record_malformed(&e),
                },
                WsMessage::Connected => {
                    tracing::info!("Binance feed connected");
                }
                WsMessage::Disconnected => {
                    tracing::warn!("Binance feed disconnected");
                    break;
                }
                WsMessage::Reconnecting { attempt } => {
                    tracing::warn!(attempt, "Binance feed reconnecting...");
                }
            }
        }
    }
}

#[async_trait]
impl TickSource for BinanceBookTickerFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Tick>> {
        let (tick_tx, tick_rx) = mpsc::channel(1024);

        tracing::info!(symbol = %self.symbol, url = %self.ws_url(), "Subscribing to Binance book ticker");

        let ws_rx = WsClient::new(self.ws_config()).connect();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            Self::run_message_loop(ws_rx, tick_tx, stats).await;
        });

        Ok(tick_rx)
    }

    fn stats(&self) -> Arc<FeedStats> {
        self.stats.clone()
    }
}
