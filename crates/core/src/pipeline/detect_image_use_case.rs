use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::pipeline::frame_analysis::FrameAnalysis;
use crate::pipeline::frame_analyzer::FrameAnalyzer;
use crate::pipeline::pipeline_logger::NullPipelineLogger;
use crate::video::domain::image_codec::{CodecError, ImageCodec};

/// One analyzer (and its loaded models) shared by every caller.
pub type SharedAnalyzer = Arc<Mutex<FrameAnalyzer>>;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Input(#[from] CodecError),
    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// Single-image analysis: base64 payload → frame → [`FrameAnalysis`].
#[derive(Clone)]
pub struct DetectImageUseCase {
    codec: Arc<dyn ImageCodec>,
    analyzer: SharedAnalyzer,
}

impl DetectImageUseCase {
    pub fn new(codec: Arc<dyn ImageCodec>, analyzer: SharedAnalyzer) -> Self {
        Self { codec, analyzer }
    }

    /// Decodes and analyses one image. Blocks on inference.
    pub fn execute(&self, payload: &str) -> Result<FrameAnalysis, DetectError> {
        let frame = self.codec.decode_base64(payload)?;
        let mut analyzer = self.analyzer.lock().unwrap_or_else(|e| e.into_inner());
        analyzer
            .analyze(&frame, &mut NullPipelineLogger)
            .map_err(|e| DetectError::Analysis(e.to_string()))
    }
}
