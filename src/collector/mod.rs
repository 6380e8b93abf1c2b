//! Fan-out collector
//!
//! Requests one frame from every endpoint at once and reports one [`CaptureResult`] per
//! endpoint. Endpoints do not wait for each other: each request runs on its own task with
//! its own timeout, and a failure is just another result.
//!
//! ```rust,no_run
//! use fleetcap::FanoutCollector;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let collector = FanoutCollector::new();
//! let results = collector
//!     .collect(["10.0.0.1", "10.0.0.2", "10.0.0.3"], Duration::from_secs(2))
//!     .await;
//!
//! for result in &results {
//!     match result.frame() {
//!         Some(frame) => println!("{}: {} bytes", result.endpoint(), frame.len()),
//!         None => println!("{}: {}", result.endpoint(), result.failure_reason().unwrap()),
//!     }
//! }
//! # }
//! ```

pub mod address;
mod batch;

pub use batch::FanoutBatch;

use bytes::Bytes;
use futures::Stream;
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::StatusCode;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::endpoint::DEFAULT_PORT;
use crate::envelope;
use crate::types::{CaptureRequest, CaptureResult, EndpointId, FailureReason, Frame};
use crate::{CaptureError, Result};

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

/// Largest response body accepted from one endpoint unless configured otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Issues capture requests to a fleet of endpoints in parallel.
///
/// Cloning is cheap and clones share one connection pool.
#[derive(Debug, Clone)]
pub struct FanoutCollector {
    client: HttpClient,
    default_port: u16,
    max_body_bytes: usize,
}

impl FanoutCollector {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build(connector);

        Self { client, default_port: DEFAULT_PORT, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Port used for endpoint addresses that do not name one
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Cap on the envelope body read from each endpoint. A larger body settles that
    /// endpoint as [`FailureReason::MalformedPayload`] without buffering the rest.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Start one request per distinct endpoint, all with the same timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<I, E>(&self, endpoints: I, timeout: Duration) -> FanoutBatch
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointId>,
    {
        self.start_requests(
            endpoints.into_iter().map(|endpoint| CaptureRequest::new(endpoint, timeout)),
        )
    }

    /// Start prepared requests, each with its own timeout.
    ///
    /// Repeated endpoints are requested once; the first request for an endpoint wins.
    pub fn start_requests<I>(&self, requests: I) -> FanoutBatch
    where
        I: IntoIterator<Item = CaptureRequest>,
    {
        let mut batch = FanoutBatch::new();
        let mut seen = HashSet::new();

        for request in requests {
            if !seen.insert(request.endpoint.clone()) {
                debug!(endpoint = %request.endpoint, "Skipping duplicate endpoint");
                continue;
            }

            let collector = self.clone();
            let endpoint = request.endpoint.clone();
            batch.spawn(endpoint, async move { collector.capture_one(request).await });
        }

        debug!(endpoints = batch.pending(), "Collection round started");
        batch
    }

    /// Request every endpoint and wait until all of them have settled.
    pub async fn collect<I, E>(&self, endpoints: I, timeout: Duration) -> Vec<CaptureResult>
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointId>,
    {
        let started = Instant::now();
        let results = self.start(endpoints, timeout).collect().await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            succeeded,
            failed = results.len() - succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection round complete"
        );
        results
    }

    /// Request every endpoint and yield results as they settle.
    pub fn stream<I, E>(
        &self,
        endpoints: I,
        timeout: Duration,
    ) -> impl Stream<Item = CaptureResult> + Send + 'static
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointId>,
    {
        self.start(endpoints, timeout).into_stream()
    }

    /// Perform a single request and fold any failure into the result.
    pub async fn capture_one(&self, request: CaptureRequest) -> CaptureResult {
        let started = Instant::now();

        match self.fetch(&request).await {
            Ok(frame) => {
                debug!(
                    endpoint = %request.endpoint,
                    bytes = frame.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Captured frame"
                );
                CaptureResult::success(request.endpoint, frame)
            }
            Err(e) => {
                let reason = e.reason().unwrap_or(FailureReason::Unreachable);
                warn!(endpoint = %request.endpoint, %reason, error = %e, "Capture failed");
                CaptureResult::failure(request.endpoint, reason)
            }
        }
    }

    async fn fetch(&self, request: &CaptureRequest) -> Result<Frame> {
        let endpoint = request.endpoint.as_str();
        let uri = address::resolve(endpoint, self.default_port)?;

        let exchange = async {
            let response = self.client.get(uri).await.map_err(|e| {
                let reason = if e.is_connect() { "connection failed" } else { "request failed" };
                CaptureError::unreachable_with_source(endpoint, reason, Box::new(e))
            })?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(CaptureError::bad_status(endpoint, status.as_u16()));
            }

            let body = Limited::new(response.into_body(), self.max_body_bytes)
                .collect()
                .await
                .map_err(|e| {
                    if e.is::<LengthLimitError>() {
                        CaptureError::malformed(format!(
                            "body from {endpoint} exceeds {} bytes",
                            self.max_body_bytes
                        ))
                    } else {
                        CaptureError::unreachable_with_source(endpoint, "response body interrupted", e)
                    }
                })?
                .to_bytes();

            Ok(Frame::new(envelope::decode(&body)?))
        };

        tokio::time::timeout(request.timeout, exchange)
            .await
            .map_err(|_| CaptureError::timed_out(endpoint, request.timeout))?
    }
}

impl Default for FanoutCollector {
    fn default() -> Self {
        Self::new()
    }
}
