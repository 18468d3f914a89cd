use std::io::Cursor;

use base64::Engine;
use image::ImageEncoder;

use crate::shared::frame::Frame;
use crate::video::domain::image_codec::{strip_data_url, CodecError, ImageCodec};

/// Decodes and encodes frames with the `image` crate.
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self
    }

    fn to_rgb_image(frame: &Frame) -> Result<image::RgbImage, CodecError> {
        if frame.channels() != 3 {
            return Err(CodecError::Encode(format!(
                "expected 3 channels, got {}",
                frame.channels()
            )));
        }
        image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| CodecError::Encode("frame data does not match dimensions".into()))
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, 3, 0))
    }

    fn decode_base64(&self, payload: &str) -> Result<Frame, CodecError> {
        let body = strip_data_url(payload);
        if body.is_empty() {
            return Err(CodecError::Empty);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| CodecError::Base64(e.to_string()))?;
        self.decode(&bytes)
    }

    fn encode_png(&self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        let img = Self::to_rgb_image(frame)?;
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    fn encode_jpeg(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, CodecError> {
        let img = Self::to_rgb_image(frame)?;
        let mut buf = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }
}
