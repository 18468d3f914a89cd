/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, confidence filtering and NMS.
use std::path::Path;

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;
use super::math::{candidate_rows, letterbox, model_input_size, nms, Letterbox};

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO face model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        let input_size = model_input_size(&session);
        log::info!(
            "Loaded face model {} ({input_size}px input)",
            model_path.display()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let (input_tensor, placement) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = candidate_rows(data, tensor.shape())?;

        Ok(decode_faces(
            &rows,
            &placement,
            self.confidence,
            frame.width(),
            frame.height(),
        ))
    }
}

/// Turns raw candidate rows into NMS-filtered boxes clamped to the frame.
///
/// Row format: `[cx, cy, w, h, score, ...]` in letterbox coordinates; any
/// trailing landmark or class values are ignored.
fn decode_faces(
    rows: &[Vec<f32>],
    placement: &Letterbox,
    confidence: f64,
    frame_w: u32,
    frame_h: u32,
) -> Vec<FaceBox> {
    let fw = frame_w as f64;
    let fh = frame_h as f64;

    let candidates: Vec<([f64; 4], f64)> = rows
        .iter()
        .filter(|row| row.len() >= 5 && row[4] as f64 >= confidence)
        .map(|row| {
            let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            let (x1, y1) = placement.unmap(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = placement.unmap(cx + w / 2.0, cy + h / 2.0);
            (
                [x1.clamp(0.0, fw), y1.clamp(0.0, fh), x2.clamp(0.0, fw), y2.clamp(0.0, fh)],
                row[4] as f64,
            )
        })
        .collect();

    nms(&candidates, NMS_IOU_THRESH)
        .into_iter()
        .map(|i| {
            let ([x1, y1, x2, y2], conf) = candidates[i];
            FaceBox::new(x1, y1, x2, y2, conf)
        })
        .collect()
}
