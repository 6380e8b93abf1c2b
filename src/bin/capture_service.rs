//! Capture service binary
//!
//! Keeps the latest camera frame in memory and serves it at `GET /capture`.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use fleetcap::logging::{self, LogFormat};
use fleetcap::{CaptureService, FrameSource, ServiceConfig, ShutdownPolicy, SourceConfig};

/// Serve the most recent camera frame over HTTP
#[derive(Parser, Debug)]
#[command(name = "capture-service", author, version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "FLEETCAP_SERVICE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, env = "FLEETCAP_LISTEN")]
    listen: Option<SocketAddr>,

    /// Override the capture interval in milliseconds
    #[arg(long, env = "FLEETCAP_CAPTURE_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Answer 500 once shutdown has begun instead of serving the last frame
    #[arg(long)]
    fail_fast: bool,

    /// Use generated frames instead of a camera
    #[arg(long, conflicts_with = "image")]
    synthetic: bool,

    /// Serve this image file, re-read every cycle, instead of a camera
    #[arg(long, env = "FLEETCAP_IMAGE")]
    image: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "FLEETCAP_VERBOSE")]
    verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "FLEETCAP_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Cli {
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.capture_interval_ms = interval_ms;
        }
        if self.fail_fast {
            config.shutdown_policy = ShutdownPolicy::FailFast;
        }
        if self.synthetic {
            config.source = SourceConfig::Synthetic { payload_len: 4096, delay_ms: 0, fail_every: 0 };
        } else if let Some(path) = &self.image {
            config.source = SourceConfig::File { path: path.clone() };
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Capture service starting");

    let result = run(&cli).await;
    if let Err(ref e) = result {
        tracing::error!(error = %e, "Capture service failed");
    }
    result
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.service_config()?;

    let service = CaptureService::from_config(&config)?
        .bind(config.listen)
        .await
        .with_context(|| format!("Failed to start endpoint on {}", config.listen))?;

    info!(
        addr = %service.local_addr(),
        interval_ms = config.capture_interval_ms,
        policy = ?config.shutdown_policy,
        "Serving frames"
    );

    let signal = shutdown_signal().context("Failed to install signal handlers")?;
    let producer = service.shutdown_on(signal).await.context("Shutdown did not complete cleanly")?;
    info!(source = producer.source().name(), "Capture service stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where that exists.
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        #[cfg(unix)]
        let terminated = terminate.recv();
        #[cfg(not(unix))]
        let terminated = std::future::pending::<Option<()>>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Ctrl-C received"),
                Err(e) => tracing::warn!(error = %e, "Ctrl-C handler failed, shutting down"),
            },
            _ = terminated => info!("SIGTERM received"),
        }
    })
}
