use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("image payload is empty")]
    Empty,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("cannot decode image: {0}")]
    Decode(String),
    #[error("cannot encode image: {0}")]
    Encode(String),
}

/// Converts between encoded image bytes and RGB frames.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError>;

    /// Decodes a base64 image, with or without a `data:` URL prefix.
    fn decode_base64(&self, payload: &str) -> Result<Frame, CodecError>;

    /// Lossless encoding for stored captures.
    fn encode_png(&self, frame: &Frame) -> Result<Vec<u8>, CodecError>;

    /// Lossy encoding for streamed previews; `quality` is 1..=100.
    fn encode_jpeg(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Strips a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(payload: &str) -> &str {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, body)| body)
            .unwrap_or("")
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("iVBORw0KGgo=", "iVBORw0KGgo=")]
    #[case("data:image/png;base64,iVBORw0KGgo=", "iVBORw0KGgo=")]
    #[case("  data:image/jpeg;base64,/9j/4AAQ \n", "/9j/4AAQ")]
    #[case("data:image/png;base64", "")]
    fn test_strip_data_url(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_data_url(input), expected);
    }
}
