//! Persistence sinks for collection results

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info};

use crate::types::{CaptureResult, EndpointId};
use crate::{CaptureError, Result};

/// Consumer of collection results.
///
/// A sink sees every result of a round, failures included, and decides what to keep.
#[async_trait::async_trait]
pub trait PersistenceSink: Send {
    /// Sink name used in log lines
    fn name(&self) -> &str;

    async fn persist(&mut self, result: &CaptureResult) -> Result<()>;
}

/// Writes each captured frame to `<endpoint>_<YYYYmmdd_HHMMSS>.jpg` in a directory.
///
/// Failures are logged and nothing is written for them. Two frames from the same
/// endpoint captured within the same second share a file name; the later one wins.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: u64,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CaptureError::io_error(&dir, e))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// File name for a frame from `endpoint` captured at `at` (local time)
    pub fn file_name(endpoint: &EndpointId, at: SystemTime) -> String {
        let at: DateTime<Local> = at.into();
        format!("{}_{}.jpg", endpoint.file_stem(), at.format("%Y%m%d_%H%M%S"))
    }
}

#[async_trait::async_trait]
impl PersistenceSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    async fn persist(&mut self, result: &CaptureResult) -> Result<()> {
        match result {
            CaptureResult::Success { endpoint, frame } => {
                let path = self.dir.join(Self::file_name(endpoint, frame.captured_at()));
                tokio::fs::write(&path, frame.data())
                    .await
                    .map_err(|e| CaptureError::io_error(&path, e))?;
                self.written += 1;
                info!(endpoint = %endpoint, path = %path.display(), bytes = frame.len(), "Saved frame");
            }
            CaptureResult::Failure { endpoint, reason } => {
                debug!(endpoint = %endpoint, %reason, "No frame to save");
            }
        }
        Ok(())
    }
}

/// Logs every result and keeps nothing.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl PersistenceSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn persist(&mut self, result: &CaptureResult) -> Result<()> {
        match result {
            CaptureResult::Success { endpoint, frame } => {
                info!(endpoint = %endpoint, bytes = frame.len(), "Frame captured");
            }
            CaptureResult::Failure { endpoint, reason } => {
                error!(endpoint = %endpoint, %reason, "Frame capture failed");
            }
        }
        Ok(())
    }
}
