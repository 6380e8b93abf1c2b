//! Frame type shared by the capture service and the collector

use bytes::Bytes;
use std::time::SystemTime;

/// One encoded image plus the moment it was created.
///
/// The byte buffer is reference counted and immutable: cloning a `Frame` never copies
/// image data, and nothing can mutate a frame once it has been handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded image bytes (JPEG on the wire)
    data: Bytes,

    /// When the frame was captured (or received, on the collector side)
    captured_at: SystemTime,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), captured_at: SystemTime::now() }
    }

    /// Create a frame with an explicit timestamp
    pub fn with_timestamp(data: impl Into<Bytes>, captured_at: SystemTime) -> Self {
        Self { data: data.into(), captured_at }
    }

    /// Image bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time elapsed since capture, zero if the clock went backwards
    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed().unwrap_or_default()
    }
}
