//! Feed connection settings, events and errors

use std::time::Duration;
use thiserror::Error;

/// Connection settings for a streaming feed
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Consecutive failed connections tolerated; 0 retries forever
    pub max_reconnect_attempts: u32,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Keepalive period; an unanswered ping by the next tick drops the connection
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 0,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_reconnect_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_reconnect_delay = d;
        self
    }

    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_reconnect_delay
            .saturating_mul(1 << shift)
            .min(self.max_reconnect_delay)
    }
}

/// What the connection task reports to its consumer
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// Raw text frame, e.g. one bookTicker update
    Text(String),
    Connected,
    /// The task has stopped and will not reconnect
    Disconnected,
    Reconnecting { attempt: u32 },
}

/// Why a feed connection ended
#[derive(Error, Debug, Clone)]
pub enum WsError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Closed by server: {0}")]
    ClosedByServer(String),

    #[error("No pong within {0:?}")]
    PongTimeout(Duration),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Gave up after {0} reconnect attempts")]
    GaveUp(u32),
}
