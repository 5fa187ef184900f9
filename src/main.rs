#![forbid(unsafe_code)]

//! `scope-intercom` — the Analyzer process of the closed-loop recording
//! system.
//!
//! Bootstraps configuration, (re)creates the named channels, then drives one
//! recording session: filename → configure → initialize → review → ready
//! signal → streaming analysis.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use scope_intercom::channel::fifo::FifoChannel;
use scope_intercom::config::GlobalConfig;
use scope_intercom::driver::review::{AutoReviewGate, ReviewGate, StdinReviewGate};
use scope_intercom::driver::SessionDriver;
use scope_intercom::engine::worker::WorkerLauncher;
use scope_intercom::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "scope-intercom", about = "Closed-loop acquisition/analysis coordinator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the results directory from the configuration file.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Skip the interactive review pause after initialization.
    #[arg(long)]
    auto_review: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("scope-intercom analyzer bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load_from_path(&args.config)?;

    if let Some(dir) = args.results_dir {
        config.results_dir = dir;
    }
    info!(results_dir = %config.results_dir.display(), "configuration loaded");

    let from_controller = FifoChannel::new(config.channels.from_controller.clone());
    let to_controller = FifoChannel::new(config.channels.to_controller.clone());
    let factory = Arc::new(WorkerLauncher::new(config.worker.clone()));

    let review: Box<dyn ReviewGate> = if args.auto_review || config.review.auto {
        Box::new(AutoReviewGate::new(None))
    } else {
        Box::new(StdinReviewGate)
    };

    let mut driver = SessionDriver::new(
        &config,
        Box::new(from_controller),
        Box::new(to_controller),
        factory,
        review,
    );

    match driver.run().await {
        Ok(summary) => {
            info!(
                frames = summary.frames_processed,
                components = summary.components,
                "session complete"
            );
            Ok(())
        }
        Err(err) => {
            error!(%err, "session failed");
            Err(err)
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
