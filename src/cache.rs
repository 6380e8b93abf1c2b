//! Single-slot latest-frame cache.
//!
//! The cache holds at most one [`Frame`]: the most recently published one. It is split
//! into two handles, the same way a `tokio::sync::watch` channel is:
//!
//! - [`FramePublisher`] is the only write handle. It is not `Clone` and `publish` takes
//!   `&mut self`, so there is exactly one writer by construction.
//! - [`FrameCache`] is the read handle. Clone it freely, one per request handler.
//!
//! Frames are stored as `Arc<Frame>`. Publishing swaps the `Arc` under the channel's
//! lock and reading clones it, so neither side ever holds the lock while an image is
//! being captured or transmitted. A reader that is mid-transmission keeps its own `Arc`
//! alive after the slot has moved on to a newer frame.
//!
//! ```rust
//! use fleetcap::{Frame, cache};
//!
//! let (mut publisher, cache) = cache::channel();
//! assert!(cache.read().is_none());
//!
//! publisher.publish(Frame::new(vec![0xFF, 0xD8, 0xFF, 0xD9]));
//! assert_eq!(cache.read().map(|f| f.len()), Some(4));
//! ```

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::types::Frame;
use crate::{CaptureError, Result};

type Slot = Option<Arc<Frame>>;

/// Create a connected publisher/cache pair with an empty (not ready) slot.
pub fn channel() -> (FramePublisher, FrameCache) {
    let (tx, rx) = watch::channel(None);
    let published = Arc::new(AtomicU64::new(0));

    (
        FramePublisher { tx, published: Arc::clone(&published) },
        FrameCache { rx, published },
    )
}

/// Write half of the cache. Owned by the producer loop.
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Slot>,
    published: Arc<AtomicU64>,
}

impl FramePublisher {
    /// Install `frame` as the latest frame, releasing the previous one once the last
    /// reader holding it is done.
    pub fn publish(&mut self, frame: Frame) {
        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(bytes = frame.len(), count, "Publishing frame");

        // send_replace succeeds even when every reader has gone away
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// A new read handle attached to this publisher's slot
    pub fn cache(&self) -> FrameCache {
        FrameCache { rx: self.tx.subscribe(), published: Arc::clone(&self.published) }
    }
}

/// Read half of the cache.
#[derive(Debug, Clone)]
pub struct FrameCache {
    rx: watch::Receiver<Slot>,
    published: Arc<AtomicU64>,
}

impl FrameCache {
    /// Latest completed frame, or `None` before the first publish.
    ///
    /// Only blocks for as long as the publisher holds the slot to swap one `Arc` for
    /// another.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Number of frames published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Wait until the first frame is available.
    ///
    /// Returns the frame immediately if the cache is already ready. Fails with
    /// [`CaptureError::NotReady`] if `timeout` elapses first or if the publisher is
    /// dropped without ever publishing.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Arc<Frame>> {
        let mut rx = self.rx.clone();
        let wait = async move {
            match rx.wait_for(Option::is_some).await {
                Ok(slot) => slot.clone(),
                Err(_) => None,
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) | Err(_) => Err(CaptureError::NotReady),
        }
    }

    /// Stream of frames: the current one (if any), then each newly published frame.
    ///
    /// Intermediate frames published faster than the consumer polls are skipped; the
    /// stream always moves to the latest. It ends when the publisher is dropped.
    pub fn frames(&self) -> impl Stream<Item = Arc<Frame>> + Send + 'static {
        WatchStream::new(self.rx.clone()).filter_map(|slot| async move { slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Frame whose every 4-byte word is `seq`, so a mixture of two frames is detectable
    fn stamped_frame(seq: u32) -> Frame {
        let words = 16 + (seq % 48) as usize;
        let data: Vec<u8> = std::iter::repeat_n(seq.to_le_bytes(), words).flatten().collect();
        Frame::new(data)
    }

    fn stamp_of(frame: &Frame) -> u32 {
        let data = frame.data();
        assert_eq!(data.len() % 4, 0, "frame length must be whole words");

        let mut words = data.chunks_exact(4).map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
        let first = words.next().expect("frame must not be empty");
        assert!(words.all(|w| w == first), "torn frame observed");
        assert_eq!(data.len() / 4, 16 + (first % 48) as usize, "frame length does not match stamp");
        first
    }

    #[test]
    fn not_ready_before_first_publish() {
        let (_publisher, cache) = channel();

        assert!(cache.read().is_none());
        assert!(!cache.is_ready());
        assert_eq!(cache.published(), 0);
    }

    #[test]
    fn repeated_reads_are_identical() {
        let (mut publisher, cache) = channel();
        publisher.publish(stamped_frame(7));

        let first = cache.read().expect("ready");
        let second = cache.read().expect("ready");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.data(), second.data());
    }

    #[test]
    fn publish_replaces_but_keeps_outstanding_snapshots() {
        let (mut publisher, cache) = channel();
        publisher.publish(stamped_frame(1));
        let held = cache.read().expect("ready");

        publisher.publish(stamped_frame(2));

        assert_eq!(stamp_of(&held), 1);
        assert_eq!(stamp_of(&cache.read().expect("ready")), 2);
        assert_eq!(cache.published(), 2);
    }

    #[test]
    fn frozen_after_publisher_drop() {
        let (mut publisher, cache) = channel();
        publisher.publish(stamped_frame(3));
        drop(publisher);

        assert_eq!(stamp_of(&cache.read().expect("frozen frame")), 3);
    }

    #[tokio::test]
    async fn wait_ready_returns_first_frame() {
        let (mut publisher, cache) = channel();

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_ready(Duration::from_secs(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish(stamped_frame(11));

        let frame = waiter.await.expect("join").expect("ready");
        assert_eq!(stamp_of(&frame), 11);
    }

    #[tokio::test]
    async fn wait_ready_times_out_or_fails_without_publisher() {
        let (publisher, cache) = channel();

        let timed_out = cache.wait_ready(Duration::from_millis(20)).await;
        assert!(matches!(timed_out, Err(CaptureError::NotReady)));

        drop(publisher);
        let abandoned = cache.wait_ready(Duration::from_secs(5)).await;
        assert!(matches!(abandoned, Err(CaptureError::NotReady)));
    }

    #[tokio::test]
    async fn frames_stream_skips_not_ready_and_ends_with_publisher() {
        let (mut publisher, cache) = channel();
        let mut frames = Box::pin(cache.frames());

        publisher.publish(stamped_frame(5));
        let first = frames.next().await.expect("first frame");
        assert_eq!(stamp_of(&first), 5);

        publisher.publish(stamped_frame(6));
        let second = frames.next().await.expect("second frame");
        assert_eq!(stamp_of(&second), 6);

        drop(publisher);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_torn_or_regressing_frames() {
        let _ = tracing_subscriber::fmt::try_init();

        const FRAMES: u32 = 20_000;
        const READERS: usize = 6;

        let (mut publisher, cache) = channel();
        let done = Arc::new(AtomicBool::new(false));

        let mut readers = Vec::new();
        for _ in 0..READERS {
            let cache = cache.clone();
            let done = Arc::clone(&done);
            readers.push(tokio::spawn(async move {
                let mut last_seen = None;
                let mut observed = 0u64;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    if let Some(frame) = cache.read() {
                        let stamp = stamp_of(&frame);
                        if let Some(previous) = last_seen {
                            assert!(stamp >= previous, "frame went backwards: {previous} -> {stamp}");
                        }
                        last_seen = Some(stamp);
                        observed += 1;
                    }
                    if finished {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                (last_seen, observed)
            }));
        }

        let producer = tokio::spawn(async move {
            for seq in 0..FRAMES {
                publisher.publish(stamped_frame(seq));
                if seq % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            publisher
        });

        let _publisher = producer.await.expect("producer");
        done.store(true, Ordering::Release);

        for reader in readers {
            let (last_seen, observed) = reader.await.expect("reader");
            assert!(observed > 0);
            assert_eq!(last_seen, Some(FRAMES - 1), "final read must see the last publish");
        }
        assert_eq!(cache.published(), FRAMES as u64);
    }
}
