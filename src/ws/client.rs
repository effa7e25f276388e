//! Reconnecting feed connection

use super::types::{WsConfig, WsError, WsMessage};
use crate::telemetry::{increment, CounterMetric};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Receive-only client; the feed never writes anything but keepalives
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Spawn the connection task and return its event channel
    ///
    /// The task ends when the receiver is dropped or reconnects run out.
    pub fn connect(&self) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, tx).await {
                tracing::error!(error = %e, "Feed connection task stopped");
            }
        });

        rx
    }

    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsMessage>,
    ) -> Result<(), WsError> {
        let mut attempts = 0;

        loop {
            match Self::connect_and_stream(&config, &tx, &mut attempts).await {
                Ok(()) => {
                    tracing::info!("Feed consumer gone, connection closed");
                    let _ = tx.send(WsMessage::Disconnected).await;
                    return Ok(());
                }
                Err(e) => {
                    if tx.is_closed() {
                        tracing::info!("Feed consumer gone, not reconnecting");
                        return Ok(());
                    }

                    attempts += 1;
                    increment(CounterMetric::FeedReconnects);
                    tracing::warn!(
                        error = %e,
                        attempt = attempts,
                        "Feed connection lost"
                    );

                    if config.max_reconnect_attempts > 0 && attempts > config.max_reconnect_attempts
                    {
                        let _ = tx.send(WsMessage::Disconnected).await;
                        return Err(WsError::GaveUp(config.max_reconnect_attempts));
                    }

                    let _ = tx.send(WsMessage::Reconnecting { attempt: attempts }).await;
                    sleep(config.backoff(attempts)).await;
                }
            }
        }
    }

    /// Stream one connection until it closes or fails
    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        attempts: &mut u32,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting feed");

        let (ws_stream, _response) = connect_async(&config.url)
            .await
            .map_err(|e| WsError::Connect(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        *attempts = 0;
        if tx.send(WsMessage::Connected).await.is_err() {
            return Ok(());
        }

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ping_interval.tick().await;
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::Write(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            // Binance ends every session after 24h.
                            return Err(WsError::ClosedByServer(format!("{:?}", frame)));
                        }
                        Some(Err(e)) => {
                            return Err(WsError::Stream(e.to_string()));
                        }
                        None => {
                            return Err(WsError::Stream("ended without close frame".into()));
                        }
                        _ => {}
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::PongTimeout(config.ping_interval));
                    }
                    write.send(Message::Ping(Vec::new())).await
                        .map_err(|e| WsError::Write(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
