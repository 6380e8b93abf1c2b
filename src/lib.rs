//! Latest-frame capture service and fan-out collector for edge camera fleets.
//!
//! Each device runs a capture service: a producer loop refreshes a single latest-frame
//! slot from a camera, and an HTTP endpoint serves that slot at `GET /capture`. A central
//! collector asks every device for its frame at once and hands whatever comes back to a
//! persistence sink.
//!
//! # Features
//!
//! - **Non-blocking reads**: handlers only swap an `Arc`, never wait on the camera
//! - **Explicit lifecycle**: stopping the producer waits for the capture in flight
//! - **Failure isolation**: one slow or dead device never holds up the others
//! - **Failures as data**: every endpoint yields exactly one result per round
//!
//! # Quick Start
//!
//! ## Capture service
//!
//! ```rust,no_run
//! use fleetcap::{CaptureService, sources::SyntheticSource};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> fleetcap::Result<()> {
//!     let service = CaptureService::new(SyntheticSource::new())
//!         .with_interval(Duration::from_millis(500))
//!         .bind("0.0.0.0:8080".parse().unwrap())
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Collector
//!
//! ```rust,no_run
//! use fleetcap::{FanoutCollector, PersistenceSink, sink::DirectorySink};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> fleetcap::Result<()> {
//!     let mut sink = DirectorySink::new("./captures")?;
//!     let results = FanoutCollector::new()
//!         .collect(["raspberrypi1.local", "raspberrypi2.local"], Duration::from_secs(2))
//!         .await;
//!
//!     for result in &results {
//!         sink.persist(result).await?;
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Capture side
pub mod cache;
pub mod endpoint;
pub mod envelope;
pub mod producer;
pub mod service;
pub mod source;
pub mod sources;

// Collection side
pub mod collector;
pub mod sink;

pub mod config;
pub mod logging;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use cache::{FrameCache, FramePublisher};
pub use collector::{FanoutBatch, FanoutCollector};
pub use config::{CollectorConfig, ServiceConfig, SourceConfig};
pub use endpoint::{CaptureEndpoint, ShutdownPolicy};
pub use producer::{Producer, ProducerHandle, ProducerState};
pub use service::{CaptureService, RunningService};
pub use sink::PersistenceSink;
pub use source::FrameSource;
