//! Endpoint address resolution

use hyper::Uri;

use crate::endpoint::CAPTURE_PATH;
use crate::{CaptureError, Result};

/// Turn a configured endpoint address into the capture URL to request.
///
/// - `host` becomes `http://host:<default_port>/capture`
/// - `host:port` becomes `http://host:port/capture`
/// - `http://…` URLs keep their authority; an empty or `/` path becomes `/capture`
///
/// Anything that cannot be turned into a plain-HTTP URL is reported as unreachable for
/// that endpoint alone.
pub fn resolve(address: &str, default_port: u16) -> Result<Uri> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(CaptureError::unreachable(address, "empty endpoint address"));
    }

    let candidate =
        if trimmed.contains("://") { trimmed.to_string() } else { format!("http://{trimmed}") };

    let uri: Uri = candidate.parse().map_err(|e| {
        CaptureError::unreachable_with_source(address, "invalid endpoint address", Box::new(e))
    })?;

    if uri.scheme_str() != Some("http") {
        return Err(CaptureError::unreachable(
            address,
            format!("unsupported scheme '{}'", uri.scheme_str().unwrap_or_default()),
        ));
    }

    let authority = uri
        .authority()
        .ok_or_else(|| CaptureError::unreachable(address, "endpoint address has no host"))?;
    let host = authority.host();
    if host.is_empty() {
        return Err(CaptureError::unreachable(address, "endpoint address has no host"));
    }
    let port = authority.port_u16().unwrap_or(default_port);

    let path = match uri.path_and_query().map(|p| p.as_str()) {
        None | Some("") | Some("/") => CAPTURE_PATH,
        Some(path) => path,
    };

    format!("http://{host}:{port}{path}").parse().map_err(|e| {
        CaptureError::unreachable_with_source(address, "invalid endpoint address", Box::new(e))
    })
}
