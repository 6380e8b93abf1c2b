//! Endpoint identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one capture device, as written in the collector configuration.
///
/// The identity is the configured address string itself (`10.0.0.1`, `cam-3.local:8081`,
/// `http://10.0.0.9:8080/capture`). Results are tagged with it so callers can match them
/// back to their endpoint list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name friendly form.
    ///
    /// `[A-Za-z0-9.-]` is kept; every other byte, `_` included, becomes `_XX` (uppercase
    /// hex). Distinct identities therefore never share a stem.
    pub fn file_stem(&self) -> String {
        let mut stem = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{byte:02X}"));
            }
        }
        stem
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for EndpointId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for EndpointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
