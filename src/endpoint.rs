//! HTTP capture endpoint
//!
//! Serves the latest cached frame at `GET /capture`:
//!
//! | Request                 | Response                                                   |
//! |-------------------------|------------------------------------------------------------|
//! | `GET /capture`, ready   | `200`, `Content-Type: text/html`, `data:image/jpeg;base64,…` |
//! | `GET /capture`, not ready | `500`, empty body                                        |
//! | other method on `/capture` | `405`, empty body                                       |
//! | any other path          | `404`, empty body                                          |
//!
//! Handlers only read the [`FrameCache`]; they never trigger a capture. The frame served
//! can be older than the request but is always a complete, previously published frame.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cache::FrameCache;
use crate::envelope;
use crate::{CaptureError, Result};

/// Path of the capture resource
pub const CAPTURE_PATH: &str = "/capture";

/// Port capture services listen on unless configured otherwise
pub const DEFAULT_PORT: u16 = 8080;

/// What `/capture` answers once shutdown has been signalled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Keep serving the last frame the producer published before it stopped
    #[default]
    ServeLast,
    /// Answer 500 to every capture request
    FailFast,
}

/// Request handler state. Cheap to clone; one clone per connection.
#[derive(Debug, Clone)]
pub struct CaptureEndpoint {
    cache: FrameCache,
    policy: ShutdownPolicy,
    shutdown: CancellationToken,
}

impl CaptureEndpoint {
    pub fn new(cache: FrameCache) -> Self {
        Self { cache, policy: ShutdownPolicy::default(), shutdown: CancellationToken::new() }
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    /// Tell handlers the service is shutting down (the producer is stopping).
    pub fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Build the response for one request.
    pub fn respond(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if path != CAPTURE_PATH {
            trace!(%method, path, "Unknown path");
            return empty(StatusCode::NOT_FOUND);
        }

        if *method != Method::GET {
            let mut response = empty(StatusCode::METHOD_NOT_ALLOWED);
            response.headers_mut().insert(header::ALLOW, HeaderValue::from_static("GET"));
            return response;
        }

        if self.policy == ShutdownPolicy::FailFast && self.is_shutting_down() {
            debug!("Capture requested during shutdown");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let Some(frame) = self.cache.read() else {
            debug!("Capture requested before first frame");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        };

        let body = envelope::encode(frame.data());
        debug!(
            bytes = frame.len(),
            age_ms = frame.age().as_millis() as u64,
            "Serving cached frame"
        );

        let mut response = Response::new(Full::new(Bytes::from(body)));
        response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response
    }

    /// Accept connections on `listener` until `close` is cancelled.
    ///
    /// Each connection is served on its own task; connections already accepted run to
    /// completion after `close`.
    pub async fn serve(self, listener: TcpListener, close: CancellationToken) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| CaptureError::server("listener has no local address", Box::new(e)))?;
        info!(%local_addr, "Capture endpoint listening");

        loop {
            let (stream, peer) = tokio::select! {
                _ = close.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        // Typically fd exhaustion; back off instead of spinning
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                },
            };

            trace!(%peer, "Accepted connection");
            let endpoint = self.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let response = endpoint.respond(request.method(), request.uri().path());
                    async move { Ok::<_, Infallible>(response) }
                });

                if let Err(e) = http1::Builder::new()
                    .title_case_headers(true)
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(%peer, error = %e, "Connection closed with error");
                }
            });
        }

        info!(%local_addr, "Capture endpoint closed");
        Ok(())
    }

    /// Bind `addr` and serve on a background task.
    pub async fn bind(self, addr: SocketAddr) -> Result<EndpointServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CaptureError::server(format!("cannot listen on {addr}"), Box::new(e)))?;
        self.spawn(listener)
    }

    /// Serve an already bound listener on a background task.
    pub fn spawn(self, listener: TcpListener) -> Result<EndpointServer> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| CaptureError::server("listener has no local address", Box::new(e)))?;
        let close = CancellationToken::new();
        let task = tokio::spawn(self.serve(listener, close.clone()));

        Ok(EndpointServer { local_addr, close, task })
    }
}

/// A capture endpoint running on a background task.
pub struct EndpointServer {
    local_addr: SocketAddr,
    close: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl EndpointServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.close.cancel();
        self.task
            .await
            .map_err(|e| CaptureError::task_failed("capture endpoint", Some(Box::new(e))))?
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
