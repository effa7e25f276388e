//! Capture command implementation

use clap::Args;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;

use crate::config::Config;
use crate::feed::BinanceBookTickerFeed;
use crate::ws::{WsClient, WsMessage};

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// File the raw frames are appended to
    #[arg(short, long, default_value = "./capture/ticks.jsonl")]
    pub output: PathBuf,

    /// Override the configured symbol
    #[arg(short, long)]
    pub symbol: Option<String>,
}

impl CaptureArgs {
    /// Append raw text frames until interrupted; returns the number written
    pub async fn execute(
        &self,
        config: &Config,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<u64> {
        let symbol = self
            .symbol
            .clone()
            .unwrap_or_else(|| config.pipeline.symbol.clone());
        let feed = BinanceBookTickerFeed::new(symbol);

        if let Some(dir) = self.output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output)
            .await?;
        let mut writer = BufWriter::new(file);

        tracing::info!(url = %feed.ws_url(), output = ?self.output, "Starting capture");
        let mut ws_rx = WsClient::new(feed.ws_config()).connect();
        let mut frames = 0u64;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                msg = ws_rx.recv() => match msg {
                    Some(WsMessage::Text(text)) => {
                        writer.write_all(text.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        frames += 1;
                        if frames % 10_000 == 0 {
                            writer.flush().await?;
                            tracing::info!(frames, "Capture progress");
                        }
                    }
                    Some(WsMessage::Reconnecting { attempt }) => {
                        tracing::warn!(attempt, "Capture feed reconnecting...");
                    }
                    Some(WsMessage::Connected) => tracing::info!("Capture feed connected"),
                    Some(WsMessage::Disconnected) | None => {
                        tracing::warn!("Capture feed disconnected");
                        break;
                    }
                }
            }
        }

        writer.flush().await?;
        tracing::info!(frames, output = ?self.output, "Capture stopped");
        Ok(frames)
    }
}
