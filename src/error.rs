//! Error types for frame capture and collection.
//!
//! This module provides the error type shared by the capture service and the collector.
//! All errors implement the `std::error::Error` trait and carry structured context
//! for logging and retry decisions.
//!
//! ## Error Categories
//!
//! - **Source Errors**: The camera, capture command or image file produced no frame
//! - **Readiness**: The frame cache has not received its first frame yet
//! - **Transport Errors**: An endpoint could not be reached or did not answer in time
//! - **Protocol Errors**: Unexpected status codes or malformed image envelopes
//! - **Setup Errors**: Configuration, file system and listener failures
//!
//! ## Errors as data
//!
//! Per-endpoint failures in a collection round are not propagated as errors. They are
//! folded into a [`FailureReason`](crate::FailureReason) and delivered alongside the
//! successful results:
//!
//! ```rust
//! use fleetcap::{CaptureError, FailureReason};
//! use std::time::Duration;
//!
//! let error = CaptureError::timed_out("10.0.0.7", Duration::from_secs(2));
//! assert_eq!(error.reason(), Some(FailureReason::TimedOut));
//! assert!(error.is_retryable());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::FailureReason;

/// Result type alias for capture operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for capture operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("Frame source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        source_name: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("No frame has been captured yet")]
    NotReady,

    #[error("Endpoint {endpoint} unreachable: {reason}")]
    Unreachable {
        endpoint: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Endpoint {endpoint} timed out after {duration:?}")]
    TimedOut { endpoint: String, duration: Duration },

    #[error("Endpoint {endpoint} answered with status {status}")]
    BadStatus { endpoint: String, status: u16 },

    #[error("Malformed image envelope: {details}")]
    MalformedPayload { details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {context}")]
    Server {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Background task failed: {context}")]
    Task {
        context: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl CaptureError {
    /// Returns whether the failed operation may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::SourceUnavailable { .. } => true,
            CaptureError::NotReady => true,
            CaptureError::Unreachable { .. } => true,
            CaptureError::TimedOut { .. } => true,
            CaptureError::BadStatus { status, .. } => *status >= 500,
            CaptureError::MalformedPayload { .. } => false,
            CaptureError::Config { .. } => false,
            CaptureError::Io { .. } => false,
            CaptureError::Server { .. } => false,
            CaptureError::Task { .. } => false,
        }
    }

    /// Maps this error onto the per-endpoint failure taxonomy.
    ///
    /// Returns `None` for errors that never describe a single endpoint's outcome
    /// (configuration, local I/O and server setup failures).
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            CaptureError::SourceUnavailable { .. } | CaptureError::NotReady => {
                Some(FailureReason::SourceUnavailable)
            }
            CaptureError::Unreachable { .. } => Some(FailureReason::Unreachable),
            CaptureError::TimedOut { .. } => Some(FailureReason::TimedOut),
            CaptureError::BadStatus { status, .. } => Some(FailureReason::BadStatus(*status)),
            CaptureError::MalformedPayload { .. } => Some(FailureReason::MalformedPayload),
            CaptureError::Task { .. } => Some(FailureReason::Aborted),
            CaptureError::Config { .. } | CaptureError::Io { .. } | CaptureError::Server { .. } => {
                None
            }
        }
    }

    /// Helper constructor for frame source failures.
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CaptureError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Helper constructor for frame source failures with an underlying cause.
    pub fn source_unavailable_with_source(
        source_name: impl Into<String>,
        reason: impl Into<String>,
        source: BoxError,
    ) -> Self {
        CaptureError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for transport failures.
    pub fn unreachable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        CaptureError::Unreachable { endpoint: endpoint.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with an underlying cause.
    pub fn unreachable_with_source(
        endpoint: impl Into<String>,
        reason: impl Into<String>,
        source: BoxError,
    ) -> Self {
        CaptureError::Unreachable {
            endpoint: endpoint.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for per-request timeouts.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        CaptureError::TimedOut { endpoint: endpoint.into(), duration }
    }

    /// Helper constructor for non-200 responses.
    pub fn bad_status(endpoint: impl Into<String>, status: u16) -> Self {
        CaptureError::BadStatus { endpoint: endpoint.into(), status }
    }

    /// Helper constructor for envelope decoding failures.
    pub fn malformed(details: impl Into<String>) -> Self {
        CaptureError::MalformedPayload { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        CaptureError::Config { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io { path: path.into(), source }
    }

    /// Helper constructor for listener and connection setup failures.
    pub fn server(context: impl Into<String>, source: BoxError) -> Self {
        CaptureError::Server { context: context.into(), source: Some(source) }
    }

    /// Helper constructor for background task failures.
    pub fn task_failed(context: impl Into<String>, source: Option<BoxError>) -> Self {
        CaptureError::Task { context: context.into(), source }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                endpoint in "[a-z0-9.]{1,24}",
                reason in ".*",
                status in 100u16..600u16,
                duration_ms in 1u64..60_000u64
            ) {
                let unreachable = CaptureError::unreachable(endpoint.clone(), reason.clone());
                let timed_out =
                    CaptureError::timed_out(endpoint.clone(), Duration::from_millis(duration_ms));
                let bad_status = CaptureError::bad_status(endpoint.clone(), status);

                let msg = unreachable.to_string();
                prop_assert!(msg.contains(&endpoint));
                prop_assert!(msg.contains(&reason));
                prop_assert!(timed_out.to_string().contains(&endpoint));
                prop_assert!(bad_status.to_string().contains(&status.to_string()));
            }

            #[test]
            fn bad_status_maps_to_its_code(status in 100u16..600u16) {
                let error = CaptureError::bad_status("cam", status);
                prop_assert_eq!(error.reason(), Some(FailureReason::BadStatus(status)));
                prop_assert_eq!(error.is_retryable(), status >= 500);
            }
        }
    }

    #[test]
    fn failure_taxonomy_mapping() {
        assert_eq!(
            CaptureError::source_unavailable("camera", "no device").reason(),
            Some(FailureReason::SourceUnavailable)
        );
        assert_eq!(CaptureError::NotReady.reason(), Some(FailureReason::SourceUnavailable));
        assert_eq!(
            CaptureError::unreachable("10.0.0.2", "connection refused").reason(),
            Some(FailureReason::Unreachable)
        );
        assert_eq!(
            CaptureError::malformed("missing prefix").reason(),
            Some(FailureReason::MalformedPayload)
        );
        assert_eq!(CaptureError::task_failed("panicked", None).reason(), Some(FailureReason::Aborted));
        assert_eq!(CaptureError::config("no endpoints").reason(), None);
    }

    #[test]
    fn retry_classification() {
        assert!(CaptureError::source_unavailable("camera", "busy").is_retryable());
        assert!(CaptureError::timed_out("cam", Duration::from_secs(1)).is_retryable());
        assert!(!CaptureError::malformed("garbage").is_retryable());
        assert!(!CaptureError::bad_status("cam", 404).is_retryable());
        assert!(!CaptureError::config("bad").is_retryable());
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = CaptureError::unreachable_with_source("10.0.0.2", "connect failed", Box::new(io));
        let source = std::error::Error::source(&error).expect("source should be kept");
        assert_eq!(source.to_string(), "refused");
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<CaptureError>();
    }

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "frame.jpg");
        let error: CaptureError = io.into();
        match error {
            CaptureError::Io { source, .. } => assert_eq!(source.to_string(), "frame.jpg"),
            other => panic!("Expected Io variant, got {other:?}"),
        }
    }
}
