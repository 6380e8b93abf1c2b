//! Image envelope used on the wire.
//!
//! A successful `/capture` response body is a data URL:
//! `data:image/jpeg;base64,<standard base64 of the JPEG bytes>` with no trailing framing.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use bytes::Bytes;

use crate::{CaptureError, Result};

/// Fixed prefix of every image envelope
pub const ENVELOPE_PREFIX: &str = "data:image/jpeg;base64,";

/// Wrap image bytes in the wire envelope.
pub fn encode(image: &[u8]) -> String {
    let mut body = String::with_capacity(ENVELOPE_PREFIX.len() + image.len().div_ceil(3) * 4);
    body.push_str(ENVELOPE_PREFIX);
    BASE64_STANDARD.encode_string(image, &mut body);
    body
}

/// Extract image bytes from a response body.
///
/// Fails with [`CaptureError::MalformedPayload`] when the body is not UTF-8, lacks the
/// prefix, is not valid base64, or carries an empty image.
pub fn decode(body: &[u8]) -> Result<Bytes> {
    let text = std::str::from_utf8(body)
        .map_err(|e| CaptureError::malformed(format!("body is not UTF-8: {e}")))?
        .trim_ascii();

    let payload = text.strip_prefix(ENVELOPE_PREFIX).ok_or_else(|| {
        let shown: String = text.chars().take(32).collect();
        CaptureError::malformed(format!("missing '{ENVELOPE_PREFIX}' prefix (body starts {shown:?})"))
    })?;

    let image = BASE64_STANDARD
        .decode(payload)
        .map_err(|e| CaptureError::malformed(format!("invalid base64 payload: {e}")))?;

    if image.is_empty() {
        return Err(CaptureError::malformed("empty image payload"));
    }

    Ok(Bytes::from(image))
}
