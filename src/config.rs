//! YAML configuration for the capture service and the collector.
//!
//! Every field has a default, so an empty file is a valid service configuration. The
//! collector needs at least its endpoint list.
//!
//! ```yaml
//! # capture-service.yaml
//! listen: 0.0.0.0:8080
//! capture_interval_ms: 500
//! shutdown_policy: serve_last
//! source:
//!   kind: command
//!   program: rpicam-still
//!   args: ["-n", "-t", "1", "-o", "{output}"]
//!   output_path: /tmp/frame.jpg
//! ```
//!
//! ```yaml
//! # collector.yaml
//! endpoints: [raspberrypi1.local, raspberrypi2.local, "10.0.0.7:8081"]
//! timeout_ms: 2000
//! output_dir: ./captures
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::DEFAULT_MAX_BODY_BYTES;
use crate::endpoint::{DEFAULT_PORT, ShutdownPolicy};
use crate::source::FrameSource;
use crate::sources::{CommandOutput, CommandSource, FileSource, SyntheticSource};
use crate::{CaptureError, Result};

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| CaptureError::io_error(path, e))?;
    serde_yaml_ng::from_str(&text)
        .map_err(|e| CaptureError::config(format!("{}: {e}", path.display())))
}

/// Capture service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the HTTP endpoint binds
    pub listen: SocketAddr,

    /// Time between capture attempts
    pub capture_interval_ms: u64,

    /// How long to wait for the first frame before accepting requests; 0 serves at once
    pub startup_wait_ms: u64,

    pub shutdown_policy: ShutdownPolicy,

    pub source: SourceConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            capture_interval_ms: 500,
            startup_wait_ms: 0,
            shutdown_policy: ShutdownPolicy::default(),
            source: SourceConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture_interval_ms == 0 {
            return Err(CaptureError::config("capture_interval_ms must be greater than zero"));
        }
        self.source.validate()
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn startup_wait(&self) -> Option<Duration> {
        (self.startup_wait_ms > 0).then(|| Duration::from_millis(self.startup_wait_ms))
    }
}

/// Which frame source the capture service drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Run a still-capture program per frame
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// Read the image from this file; stdout when absent
        #[serde(default)]
        output_path: Option<PathBuf>,
        #[serde(default = "default_command_timeout_ms")]
        timeout_ms: u64,
    },
    /// Re-read an image file per frame
    File { path: PathBuf },
    /// Generated frames, no camera needed
    Synthetic {
        #[serde(default = "default_payload_len")]
        payload_len: usize,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        fail_every: u64,
    },
}

fn default_command_timeout_ms() -> u64 {
    10_000
}

fn default_payload_len() -> usize {
    1024
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Command {
            program: "rpicam-still".to_string(),
            args: ["-n", "-t", "1", "-o", "{output}"].map(String::from).to_vec(),
            output_path: Some(PathBuf::from("/tmp/frame.jpg")),
            timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Command { program, timeout_ms, .. } => {
                if program.trim().is_empty() {
                    return Err(CaptureError::config("source.program must not be empty"));
                }
                if *timeout_ms == 0 {
                    return Err(CaptureError::config("source.timeout_ms must be greater than zero"));
                }
            }
            SourceConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(CaptureError::config("source.path must not be empty"));
                }
            }
            SourceConfig::Synthetic { .. } => {}
        }
        Ok(())
    }

    /// Instantiate the configured source
    pub fn build(&self) -> Box<dyn FrameSource> {
        match self {
            SourceConfig::Command { program, args, output_path, timeout_ms } => {
                let output = match output_path {
                    Some(path) => CommandOutput::File(path.clone()),
                    None => CommandOutput::Stdout,
                };
                Box::new(
                    CommandSource::new(program.clone(), args.clone(), output)
                        .with_timeout(Duration::from_millis(*timeout_ms)),
                )
            }
            SourceConfig::File { path } => Box::new(FileSource::new(path.clone())),
            SourceConfig::Synthetic { payload_len, delay_ms, fail_every } => Box::new(
                SyntheticSource::new()
                    .with_payload_len(*payload_len)
                    .with_delay(Duration::from_millis(*delay_ms))
                    .with_fail_every(*fail_every),
            ),
        }
    }
}

/// Collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Capture devices: `host`, `host:port` or `http://…` URLs
    pub endpoints: Vec<String>,

    /// Per-request timeout
    pub timeout_ms: u64,

    /// Port for endpoints that do not name one
    pub default_port: u16,

    /// Where captured frames are written
    pub output_dir: PathBuf,

    /// Run a round every interval; a single round when absent
    pub interval_ms: Option<u64>,

    /// Largest response body accepted from one endpoint
    pub max_body_bytes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            timeout_ms: 2_000,
            default_port: DEFAULT_PORT,
            output_dir: PathBuf::from("."),
            interval_ms: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CollectorConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        read_yaml(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(CaptureError::config("at least one endpoint is required"));
        }
        if let Some(blank) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(CaptureError::config(format!("endpoint #{} is blank", blank + 1)));
        }
        if self.timeout_ms == 0 {
            return Err(CaptureError::config("timeout_ms must be greater than zero"));
        }
        if self.interval_ms == Some(0) {
            return Err(CaptureError::config("interval_ms must be greater than zero"));
        }
        if self.max_body_bytes == 0 {
            return Err(CaptureError::config("max_body_bytes must be greater than zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}
