//! Collector binary
//!
//! Fetches the current frame from every capture device at once and stores what comes back.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use fleetcap::logging::{self, LogFormat};
use fleetcap::sink::{DirectorySink, LogSink};
use fleetcap::{CaptureResult, CollectorConfig, FanoutCollector, PersistenceSink};

/// Collect the latest frame from a fleet of capture services
#[derive(Parser, Debug)]
#[command(name = "collector", author, version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "FLEETCAP_COLLECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Endpoint to collect from; repeat for more. Replaces the configured list.
    #[arg(short, long = "endpoint", value_name = "ADDRESS")]
    endpoints: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "FLEETCAP_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Port for endpoints given without one
    #[arg(long)]
    default_port: Option<u16>,

    /// Directory frames are written to
    #[arg(short, long, env = "FLEETCAP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Largest response body accepted from one endpoint, in bytes
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// Repeat a round every this many milliseconds until Ctrl-C
    #[arg(long)]
    interval_ms: Option<u64>,

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
    fn collector_config(&self) -> Result<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => CollectorConfig::default(),
        };

        if !self.endpoints.is_empty() {
            config.endpoints = self.endpoints.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(port) = self.default_port {
            config.default_port = port;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(max) = self.max_body_bytes {
            config.max_body_bytes = max;
        }
        if self.interval_ms.is_some() {
            config.interval_ms = self.interval_ms;
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

    let result = run(&cli).await;
    if let Err(ref e) = result {
        error!(error = %e, "Collector failed");
    }
    result
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.collector_config()?;
    let collector = FanoutCollector::new()
        .with_default_port(config.default_port)
        .with_max_body_bytes(config.max_body_bytes);

    let mut sinks: Vec<Box<dyn PersistenceSink>> = vec![
        Box::new(DirectorySink::new(&config.output_dir).context("Cannot prepare output directory")?),
        Box::new(LogSink),
    ];

    info!(
        endpoints = config.endpoints.len(),
        timeout_ms = config.timeout_ms,
        output_dir = %config.output_dir.display(),
        "Collector starting"
    );

    let Some(interval) = config.interval() else {
        round(&collector, &config, &mut sinks).await;
        return Ok(());
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, stopping");
                return Ok(());
            }
            _ = ticker.tick() => round(&collector, &config, &mut sinks).await,
        }
    }
}

/// One collection round. Sink errors are logged and do not end the run.
async fn round(
    collector: &FanoutCollector,
    config: &CollectorConfig,
    sinks: &mut [Box<dyn PersistenceSink>],
) {
    let started = Instant::now();
    let results = collector.collect(config.endpoints.iter().map(String::as_str), config.timeout()).await;

    for result in &results {
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.persist(result).await {
                warn!(sink = sink.name(), endpoint = %result.endpoint(), error = %e, "Sink failed");
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let failed: Vec<String> = results
        .iter()
        .filter_map(|r| match r {
            CaptureResult::Failure { endpoint, reason } => Some(format!("{endpoint} ({reason})")),
            CaptureResult::Success { .. } => None,
        })
        .collect();

    println!(
        "{succeeded}/{} frames collected in {} ms{}",
        results.len(),
        started.elapsed().as_millis(),
        if failed.is_empty() { String::new() } else { format!("; failed: {}", failed.join(", ")) }
    );
}
