//! FrameSource trait for capture back ends

use crate::Result;
use crate::types::Frame;

/// Something that can produce one encoded image on demand.
///
/// Sources abstract over the camera stack (a still-capture command, a file another
/// process keeps refreshing, a synthetic generator). Only the producer loop calls
/// `capture`, so a source has exactly one user and needs no internal locking.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Capture one frame.
    ///
    /// May take as long as the hardware needs. Returns
    /// [`CaptureError::SourceUnavailable`](crate::CaptureError::SourceUnavailable)
    /// when no frame could be produced this time; the caller decides whether to retry.
    async fn capture(&mut self) -> Result<Frame>;

    /// Short name used in log lines
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn capture(&mut self) -> Result<Frame> {
        (**self).capture().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
