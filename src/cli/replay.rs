//! Replay command implementation

use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

use super::run::run_pipeline;
use crate::config::{Config, SourceKind};
use crate::pipeline::PipelineReport;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Captured raw book ticker frames, one per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ReplayArgs {
    pub async fn execute(
        &self,
        mut config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<PipelineReport> {
        config.source.kind = SourceKind::Replay;
        config.source.replay_path = Some(self.input.clone());
        if let Some(output) = &self.output {
            config.sink.output_path = output.clone();
        }
        config.validate()?;

        tracing::info!(input = ?self.input, output = ?config.sink.output_path, "Starting replay");
        run_pipeline(&config, shutdown).await
    }
}
