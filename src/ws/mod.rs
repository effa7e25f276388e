//! WebSocket client library
//!
//! Provides a receive-only WebSocket client with automatic reconnection,
//! ping/pong keepalive and capped exponential backoff.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
