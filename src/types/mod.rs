//! Core data types for frame capture and collection.
//!
//! - [`Frame`] is one immutable encoded image with its capture time
//! - [`EndpointId`] names a capture device in the collector's endpoint list
//! - [`CaptureRequest`] and [`CaptureResult`] describe one endpoint's part in a
//!   collection round, with [`FailureReason`] as the failure taxonomy
//!
//! ## Usage Example
//!
//! ```rust
//! use fleetcap::types::{CaptureResult, FailureReason, Frame};
//!
//! let results = vec![
//!     CaptureResult::success("10.0.0.1", Frame::new(vec![0xFF, 0xD8])),
//!     CaptureResult::failure("10.0.0.2", FailureReason::Unreachable),
//! ];
//!
//! let captured = results.iter().filter(|r| r.is_success()).count();
//! assert_eq!(captured, 1);
//! ```

mod endpoint;
mod frame;
mod result;

pub use endpoint::EndpointId;
pub use frame::Frame;
pub use result::{CaptureRequest, CaptureResult, FailureReason};
