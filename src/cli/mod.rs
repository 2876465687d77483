//! Command-line interface.
//!
//! Two subcommands mirror the two tools: `generate` materializes template
//! files, `send` replays them against a collector.

use crate::core::{BlastError, GeneratorConfig, Result, SenderConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Synthetic OTLP load generator and replay sender
#[derive(Parser, Debug)]
#[command(name = "otelblast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, env = "OTELBLAST_DEBUG", global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate timestamp-free OTLP template files
    Generate {
        /// Path to the generator configuration file
        #[arg(short, long, env = "OTELBLAST_CONFIG")]
        config: PathBuf,

        /// Write JSON twins alongside the protobuf files for debugging
        #[arg(long)]
        json: bool,

        /// Override the configured output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Replay template files against an OTLP collector
    Send {
        /// Path to the sender configuration file
        #[arg(short, long, env = "OTELBLAST_CONFIG")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Initialize logging; `RUST_LOG` wins over the debug flag.
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let default_level = if self.debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| BlastError::config(format!("failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the parsed command.
pub async fn execute(cli: Cli) -> Result<()> {
    cli.init_logging()?;

    match &cli.command {
        Command::Generate {
            config,
            json,
            output_dir,
        } => {
            let mut config = GeneratorConfig::load(config)?;
            if let Some(dir) = output_dir {
                config.output.directory = dir.clone();
            }
            crate::generator::run(&config, *json)
        }
        Command::Send { config } => {
            let config = SenderConfig::load(config)?;
            crate::sender::run(config).await
        }
    }
}
