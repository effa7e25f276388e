//! CLI interface for decay-window
//!
//! Provides subcommands for:
//! - `run`: Aggregate the configured source until interrupted
//! - `replay`: Aggregate a captured file and exit
//! - `capture`: Record raw book ticker frames for later replay
//! - `config`: Show the effective configuration

mod capture;
mod replay;
mod run;

pub use capture::CaptureArgs;
pub use replay::ReplayArgs;
pub use run::{run_pipeline, RunArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "decay-window")]
#[command(about = "Windowed decay aggregation of best bid/ask ticks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate the configured source until interrupted
    Run(RunArgs),
    /// Aggregate a captured file and exit
    Replay(ReplayArgs),
    /// Record raw book ticker frames
    Capture(CaptureArgs),
    /// Show the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from([
            "decay-window",
            "-c",
            "custom.toml",
            "replay",
            "--input",
            "ticks.jsonl",
        ]);
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Replay(args) => assert_eq!(args.input.to_str(), Some("ticks.jsonl")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["decay-window", "config"]);
        assert_eq!(cli.config, "config.toml");
        assert!(matches!(cli.command, Commands::Config));
    }
}
