//! Synthetic frame source for demos, tests and benchmarks

use std::time::Duration;
use tracing::trace;

use crate::source::FrameSource;
use crate::types::Frame;
use crate::{CaptureError, Result};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Produces deterministic JPEG-framed byte blobs.
///
/// Every frame starts with the JPEG start-of-image marker and ends with end-of-image; the
/// body is the capture counter repeated, so consecutive frames differ. Optional capture
/// latency and periodic failures make it usable for exercising the producer loop.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    name: String,
    payload_len: usize,
    delay: Duration,
    fail_every: Option<u64>,
    captures: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            name: "synthetic".to_string(),
            payload_len: 1024,
            delay: Duration::ZERO,
            fail_every: None,
            captures: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Body size between the JPEG markers
    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }

    /// Simulated exposure time per capture
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every `n`th capture fail (1-based); `0` disables failures
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Number of capture attempts so far, failed ones included
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// Bytes of the frame for capture number `seq`
    pub fn frame_bytes(seq: u64, payload_len: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(payload_len + 4);
        data.extend_from_slice(&JPEG_SOI);
        data.extend(seq.to_le_bytes().iter().copied().cycle().take(payload_len));
        data.extend_from_slice(&JPEG_EOI);
        data
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FrameSource for SyntheticSource {
    async fn capture(&mut self) -> Result<Frame> {
        self.captures += 1;
        let seq = self.captures;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_every.is_some_and(|n| seq % n == 0) {
            return Err(CaptureError::source_unavailable(
                &self.name,
                format!("injected failure on capture {seq}"),
            ));
        }

        trace!(source = %self.name, seq, "Synthetic capture");
        Ok(Frame::new(Self::frame_bytes(seq, self.payload_len)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
