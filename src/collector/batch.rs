//! One collection round in flight

use futures::Stream;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{self, JoinSet};
use tracing::error;

use crate::types::{CaptureResult, EndpointId, FailureReason};

/// The in-flight requests of one collection round.
///
/// Every endpoint runs on its own task. Results come back through the `JoinSet` in
/// completion order, so a slow endpoint only delays its own result. A task that panics
/// or is cancelled still yields a [`FailureReason::Aborted`] result for its endpoint:
/// every endpoint that was started produces exactly one result.
///
/// Dropping the batch aborts whatever is still running.
#[derive(Debug)]
pub struct FanoutBatch {
    tasks: JoinSet<CaptureResult>,
    in_flight: HashMap<task::Id, EndpointId>,
}

impl FanoutBatch {
    pub(crate) fn new() -> Self {
        Self { tasks: JoinSet::new(), in_flight: HashMap::new() }
    }

    pub(crate) fn spawn<F>(&mut self, endpoint: EndpointId, request: F)
    where
        F: Future<Output = CaptureResult> + Send + 'static,
    {
        let handle = self.tasks.spawn(request);
        self.in_flight.insert(handle.id(), endpoint);
    }

    /// Endpoints that have not settled yet
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_done(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Next settled result, or `None` once every endpoint has reported.
    pub async fn next(&mut self) -> Option<CaptureResult> {
        loop {
            match self.tasks.join_next_with_id().await? {
                Ok((id, result)) => {
                    self.in_flight.remove(&id);
                    return Some(result);
                }
                Err(join_error) => {
                    let Some(endpoint) = self.in_flight.remove(&join_error.id()) else {
                        error!(error = %join_error, "Capture task for unknown endpoint failed");
                        continue;
                    };
                    error!(endpoint = %endpoint, error = %join_error, "Capture task aborted");
                    return Some(CaptureResult::failure(endpoint, FailureReason::Aborted));
                }
            }
        }
    }

    /// Wait for every endpoint to settle.
    pub async fn collect(mut self) -> Vec<CaptureResult> {
        let mut results = Vec::with_capacity(self.pending());
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }

    /// Results as a stream, in completion order
    pub fn into_stream(self) -> impl Stream<Item = CaptureResult> + Send + 'static {
        futures::stream::unfold(self, |mut batch| async move {
            let result = batch.next().await?;
            Some((result, batch))
        })
    }
}
