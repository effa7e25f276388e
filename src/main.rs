use clap::Parser;
use decay_window::cli::{Cli, Commands};
use decay_window::config::Config;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Could not load config from {}: {}", cli.config, e))?;

    // Initialize telemetry
    decay_window::telemetry::init_telemetry(&config.telemetry)?;

    let shutdown = shutdown_signal();

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting run mode");
            args.execute(config, shutdown).await?;
        }
        Commands::Replay(args) => {
            let report = args.execute(config, shutdown).await?;
            println!(
                "Replayed {} ticks into {} records ({} late included, {} late dropped)",
                report.stats.ticks_received,
                report.stats.records_emitted,
                report.stats.late_included,
                report.stats.late_dropped
            );
        }
        Commands::Capture(args) => {
            tracing::info!("Starting capture mode");
            args.execute(&config, shutdown).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Pipeline: {} half_life={}ms period={}ms lateness={}ms fold={:?}",
                config.pipeline.symbol,
                config.pipeline.half_life_ms,
                config.pipeline.sample_period_ms,
                config.pipeline.allowed_lateness_ms,
                config.pipeline.fold_order
            );
            println!("  Source: {:?} {:?}", config.source.kind, config.source.replay_path);
            println!(
                "  Sink: {:?} -> {:?} (rotate every {}s, console={})",
                config.sink.format,
                config.sink.output_path,
                config.sink.rotation_interval_secs,
                config.sink.console
            );
            println!("  Checkpoint: {:?}", config.checkpoint_path());
            println!(
                "  Telemetry: level={} format={:?} metrics_port={:?}",
                config.telemetry.log_level, config.telemetry.log_format, config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}

/// Flips to `true` on Ctrl-C
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            }
        }
        // hold the sender until the process exits
        std::future::pending::<()>().await;
    });

    rx
}
