//! Capture service: producer loop plus HTTP endpoint over one frame cache

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cache::{self, FrameCache};
use crate::config::ServiceConfig;
use crate::endpoint::{CaptureEndpoint, EndpointServer, ShutdownPolicy};
use crate::producer::{Producer, ProducerHandle, ProducerState};
use crate::source::FrameSource;
use crate::{CaptureError, Result};

/// A capture service that has not been started yet.
pub struct CaptureService<S> {
    producer: Producer<S>,
    endpoint: CaptureEndpoint,
    startup_wait: Option<Duration>,
}

impl<S: FrameSource> CaptureService<S> {
    pub fn new(source: S) -> Self {
        let (publisher, cache) = cache::channel();
        Self {
            producer: Producer::new(source, publisher),
            endpoint: CaptureEndpoint::new(cache),
            startup_wait: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.producer = self.producer.with_interval(interval);
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.endpoint = self.endpoint.with_shutdown_policy(policy);
        self
    }

    /// Hold back the listener until the first frame arrives or `wait` elapses
    pub fn with_startup_wait(mut self, wait: Option<Duration>) -> Self {
        self.startup_wait = wait;
        self
    }

    pub fn cache(&self) -> FrameCache {
        self.producer.cache()
    }

    /// Start capturing and serve requests on `listener`.
    pub async fn start(self, listener: TcpListener) -> Result<RunningService<S>> {
        let cache = self.producer.cache();
        let producer = self.producer.start();

        if let Some(wait) = self.startup_wait {
            match cache.wait_ready(wait).await {
                Ok(frame) => info!(bytes = frame.len(), "First frame captured"),
                Err(_) => warn!(
                    wait_ms = wait.as_millis() as u64,
                    "No frame yet, serving anyway (requests answer 500 until ready)"
                ),
            }
        }

        let server = self.endpoint.clone().spawn(listener)?;
        Ok(RunningService { producer, endpoint: self.endpoint, server, cache })
    }

    /// Bind `addr`, then [`start`](Self::start).
    pub async fn bind(self, addr: SocketAddr) -> Result<RunningService<S>> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CaptureError::server(format!("cannot listen on {addr}"), Box::new(e)))?;
        self.start(listener).await
    }
}

impl CaptureService<Box<dyn FrameSource>> {
    /// Build a service from configuration, including its frame source.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.source.build())
            .with_interval(config.capture_interval())
            .with_shutdown_policy(config.shutdown_policy)
            .with_startup_wait(config.startup_wait()))
    }
}

/// A started capture service.
pub struct RunningService<S> {
    producer: ProducerHandle<S>,
    endpoint: CaptureEndpoint,
    server: EndpointServer,
    cache: FrameCache,
}

impl<S: FrameSource> RunningService<S> {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn producer_state(&self) -> ProducerState {
        self.producer.state()
    }

    /// Orderly shutdown: tell handlers, stop the producer after its current cycle, then
    /// close the listener. Returns the stopped producer, which still owns the source.
    pub async fn shutdown(self) -> Result<Producer<S>> {
        info!("Shutting down capture service");
        self.endpoint.signal_shutdown();

        let stopped = self.producer.stop().await;
        self.server.shutdown().await?;
        stopped
    }

    /// Keeps serving until `signal` resolves, then shuts down as [`shutdown`](Self::shutdown).
    pub async fn shutdown_on(self, signal: impl Future<Output = ()>) -> Result<Producer<S>> {
        signal.await;
        self.shutdown().await
    }
}
