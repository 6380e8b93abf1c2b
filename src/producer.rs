//! Producer loop that keeps the frame cache fresh
//!
//! The producer owns the [`FrameSource`] and the [`FramePublisher`]. It captures on a
//! fixed cadence and publishes every successful capture. It has an explicit lifecycle:
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopping --(cycle done)--> Stopped
//! ```
//!
//! `stop()` never interrupts a capture in progress: it waits for the current cycle to
//! finish and then hands the source back, so the camera is released only once nothing is
//! using it any more.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::cache::{FrameCache, FramePublisher};
use crate::source::FrameSource;
use crate::{CaptureError, Result};

/// Default time between capture attempts
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive failures between repeated warnings
const FAILURE_LOG_EVERY: u32 = 20;

/// Lifecycle state of a producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Stopped,
    Running,
    Stopping,
}

/// A producer that is not running. Holds the source and the cache's write handle.
pub struct Producer<S> {
    source: S,
    publisher: FramePublisher,
    interval: Duration,
    state: Arc<watch::Sender<ProducerState>>,
}

impl<S: FrameSource> Producer<S> {
    pub fn new(source: S, publisher: FramePublisher) -> Self {
        let (state, _) = watch::channel(ProducerState::Stopped);
        Self { source, publisher, interval: DEFAULT_CAPTURE_INTERVAL, state: Arc::new(state) }
    }

    /// Time between the starts of consecutive capture cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn state(&self) -> ProducerState {
        *self.state.borrow()
    }

    /// Read handle onto the cache this producer publishes into
    pub fn cache(&self) -> FrameCache {
        self.publisher.cache()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Give up the source and the publisher
    pub fn into_parts(self) -> (S, FramePublisher) {
        (self.source, self.publisher)
    }

    /// Spawn the capture loop on the current tokio runtime.
    pub fn start(self) -> ProducerHandle<S> {
        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        state.send_replace(ProducerState::Running);

        let task = tokio::spawn(Self::run(self, cancel.clone()));

        ProducerHandle { task, guard: cancel.drop_guard(), state }
    }

    async fn run(mut self, cancel: CancellationToken) -> Self {
        info!(
            source = self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Producer started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut published = 0u64;
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // The capture itself is not raced against cancellation
            match self.source.capture().await {
                Ok(frame) => {
                    if consecutive_failures > 0 {
                        info!(
                            source = self.source.name(),
                            failures = consecutive_failures,
                            "Capture recovered"
                        );
                        consecutive_failures = 0;
                    }
                    published += 1;
                    self.publisher.publish(frame);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures == 1 || consecutive_failures % FAILURE_LOG_EVERY == 0 {
                        warn!(
                            source = self.source.name(),
                            failures = consecutive_failures,
                            error = %e,
                            "Capture failed, keeping previous frame"
                        );
                    } else {
                        debug!(source = self.source.name(), error = %e, "Capture failed");
                    }
                }
            }
        }

        info!(source = self.source.name(), published, "Producer stopped");
        self
    }
}

/// A running producer.
///
/// Dropping the handle signals the loop to stop after its current cycle without waiting
/// for it; use [`stop`](Self::stop) to wait and get the source back.
pub struct ProducerHandle<S> {
    task: JoinHandle<Producer<S>>,
    guard: DropGuard,
    state: Arc<watch::Sender<ProducerState>>,
}

impl<S: FrameSource> ProducerHandle<S> {
    pub fn state(&self) -> ProducerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ProducerState> {
        self.state.subscribe()
    }

    /// Whether the capture loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop, wait for the in-progress cycle to finish, and return the stopped
    /// producer.
    pub async fn stop(self) -> Result<Producer<S>> {
        let ProducerHandle { task, guard, state } = self;

        state.send_replace(ProducerState::Stopping);
        debug!("Stopping producer");
        guard.disarm().cancel();

        let joined = task.await;
        state.send_replace(ProducerState::Stopped);

        joined.map_err(|e| CaptureError::task_failed("producer loop", Some(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache;
    use crate::sources::{FileSource, SyntheticSource};

    #[tokio::test]
    async fn lifecycle_transitions() {
        let _ = tracing_subscriber::fmt::try_init();

        let (publisher, cache) = cache::channel();
        let producer = Producer::new(SyntheticSource::new(), publisher)
            .with_interval(Duration::from_millis(5));
        assert_eq!(producer.state(), ProducerState::Stopped);

        let handle = producer.start();
        assert_eq!(handle.state(), ProducerState::Running);

        cache.wait_ready(Duration::from_secs(2)).await.expect("first frame");

        let mut states = handle.subscribe_state();
        let producer = handle.stop().await.expect("stop");
        assert_eq!(producer.state(), ProducerState::Stopped);
        assert_eq!(*states.borrow_and_update(), ProducerState::Stopped);

        // restartable
        let handle = producer.start();
        assert_eq!(handle.state(), ProducerState::Running);
        handle.stop().await.expect("second stop");
    }

    #[tokio::test]
    async fn failed_cycles_do_not_end_the_loop() {
        let (publisher, cache) = cache::channel();
        let source = SyntheticSource::new().with_fail_every(2);
        let handle = Producer::new(source, publisher).with_interval(Duration::from_millis(2)).start();

        let mut frames = Box::pin(cache.frames());
        for _ in 0..5 {
            tokio::time::timeout(Duration::from_secs(2), futures::StreamExt::next(&mut frames))
                .await
                .expect("frames keep arriving")
                .expect("stream open");
        }

        assert!(!handle.is_finished());
        let producer = handle.stop().await.expect("stop");
        let attempts = producer.source().captures();
        assert!(attempts >= 9, "expected at least 9 attempts, got {attempts}");
        assert_eq!(cache.published(), attempts - attempts / 2);
    }

    #[tokio::test]
    async fn unavailable_source_leaves_cache_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (publisher, cache) = cache::channel();
        let source = FileSource::new(dir.path().join("missing.jpg"));
        let handle = Producer::new(source, publisher).with_interval(Duration::from_millis(2)).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!cache.is_ready());
        assert_eq!(handle.state(), ProducerState::Running);

        handle.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn stop_waits_for_the_capture_in_progress() {
        let (publisher, cache) = cache::channel();
        let source = SyntheticSource::new().with_delay(Duration::from_millis(80));
        let handle = Producer::new(source, publisher).with_interval(Duration::from_millis(1)).start();

        // first capture is in flight
        tokio::time::sleep(Duration::from_millis(20)).await;
        let producer = handle.stop().await.expect("stop");

        let attempts = producer.source().captures();
        assert!(attempts >= 1);
        assert_eq!(cache.published(), attempts, "every started capture must be published");

        // cache frozen at the last value once stopped
        let (_, publisher) = producer.into_parts();
        drop(publisher);
        assert!(cache.read().is_some());
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_loop() {
        let (publisher, cache) = cache::channel();
        let handle = Producer::new(SyntheticSource::new(), publisher)
            .with_interval(Duration::from_millis(2))
            .start();
        cache.wait_ready(Duration::from_secs(2)).await.expect("first frame");

        drop(handle);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let settled = cache.published();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.published(), settled);
    }
}
