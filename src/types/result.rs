//! Per-endpoint requests and outcomes of a collection round

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{EndpointId, Frame};

/// One capture request aimed at one endpoint.
///
/// There is deliberately no retry count here: whether to try again is the
/// caller's decision after seeing the [`CaptureResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub endpoint: EndpointId,
    pub timeout: Duration,
}

impl CaptureRequest {
    pub fn new(endpoint: impl Into<EndpointId>, timeout: Duration) -> Self {
        Self { endpoint: endpoint.into(), timeout }
    }
}

/// Why a single endpoint produced no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Connection refused, DNS failure, reset, or an address that cannot be parsed
    Unreachable,

    /// No complete response within the request timeout
    TimedOut,

    /// The endpoint answered with something other than 200
    BadStatus(u16),

    /// 200 response whose body is not a recognizable image envelope
    MalformedPayload,

    /// The frame source had nothing to hand out
    SourceUnavailable,

    /// The task driving this endpoint's request died before settling
    Aborted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unreachable => f.write_str("unreachable"),
            FailureReason::TimedOut => f.write_str("timed-out"),
            FailureReason::BadStatus(code) => write!(f, "bad-status({code})"),
            FailureReason::MalformedPayload => f.write_str("malformed-payload"),
            FailureReason::SourceUnavailable => f.write_str("source-unavailable"),
            FailureReason::Aborted => f.write_str("aborted"),
        }
    }
}

/// Settled outcome of one endpoint in one collection round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Success { endpoint: EndpointId, frame: Frame },
    Failure { endpoint: EndpointId, reason: FailureReason },
}

impl CaptureResult {
    pub fn success(endpoint: impl Into<EndpointId>, frame: Frame) -> Self {
        CaptureResult::Success { endpoint: endpoint.into(), frame }
    }

    pub fn failure(endpoint: impl Into<EndpointId>, reason: FailureReason) -> Self {
        CaptureResult::Failure { endpoint: endpoint.into(), reason }
    }

    /// Endpoint this result belongs to
    pub fn endpoint(&self) -> &EndpointId {
        match self {
            CaptureResult::Success { endpoint, .. } | CaptureResult::Failure { endpoint, .. } => {
                endpoint
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaptureResult::Success { .. })
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            CaptureResult::Success { frame, .. } => Some(frame),
            CaptureResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            CaptureResult::Success { .. } => None,
            CaptureResult::Failure { reason, .. } => Some(*reason),
        }
    }
}
