//! Run command implementation

use clap::Args;
use tokio::sync::watch;

use crate::config::Config;
use crate::feed::build_source;
use crate::pipeline::{Pipeline, PipelineReport};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the configured symbol
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Also print every emitted record
    #[arg(long)]
    pub console: bool,
}

impl RunArgs {
    pub async fn execute(
        &self,
        mut config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<PipelineReport> {
        if let Some(symbol) = &self.symbol {
            config.pipeline.symbol = symbol.clone();
        }
        if self.console {
            config.sink.console = true;
        }
        config.validate()?;

        tracing::info!(
            symbol = %config.pipeline.symbol,
            source = ?config.source.kind,
            "Starting aggregation"
        );
        run_pipeline(&config, shutdown).await
    }
}

/// Wire the configured source into a pipeline and run it to completion
pub async fn run_pipeline(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<PipelineReport> {
    let source = build_source(config)?;
    let pipeline = Pipeline::from_config(config)?;

    let ticks = source.subscribe().await?;
    let report = pipeline.run(ticks, shutdown).await?;

    let stats = source.stats();
    tracing::info!(
        parsed = stats.parsed(),
        malformed = stats.malformed(),
        "Source finished"
    );

    Ok(report)
}
