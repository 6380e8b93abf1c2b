//! File-backed frame source

use std::path::{Path, PathBuf};
use tracing::trace;

use crate::source::FrameSource;
use crate::types::Frame;
use crate::{CaptureError, Result};

/// Reads an image file on every capture.
///
/// Suits set-ups where another process (a camera daemon, a cron job) keeps rewriting a
/// single JPEG on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl FrameSource for FileSource {
    async fn capture(&mut self) -> Result<Frame> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::source_unavailable_with_source(
                &self.name,
                format!("cannot read {}", self.path.display()),
                Box::new(e),
            )
        })?;

        if data.is_empty() {
            return Err(CaptureError::source_unavailable(&self.name, "image file is empty"));
        }

        trace!(path = %self.path.display(), bytes = data.len(), "Read frame from file");
        Ok(Frame::new(data))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
