/// YOLO-pose head landmark estimator using ONNX Runtime via `ort`.
///
/// Picks the most confident person and reads the COCO nose and ear keypoints.
use std::path::Path;

use crate::detection::domain::landmark_triple::LandmarkTriple;
use crate::detection::domain::pose_estimator::PoseEstimator;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;
use super::math::{candidate_rows, letterbox, model_input_size, Letterbox};

/// Box + score columns preceding the keypoints.
const KEYPOINT_OFFSET: usize = 5;
/// x, y, visibility per keypoint.
const KEYPOINT_STRIDE: usize = 3;

/// COCO keypoint indices.
const NOSE: usize = 0;
const LEFT_EAR: usize = 3;
const RIGHT_EAR: usize = 4;

pub struct OnnxPoseEstimator {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxPoseEstimator {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        let input_size = model_input_size(&session);
        log::info!(
            "Loaded pose model {} ({input_size}px input)",
            model_path.display()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn estimate(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<LandmarkTriple>, Box<dyn std::error::Error>> {
        let (input_tensor, placement) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("pose model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = candidate_rows(data, tensor.shape())?;

        Ok(decode_landmarks(
            &rows,
            &placement,
            self.confidence,
            frame.width(),
            frame.height(),
        ))
    }
}

/// Extracts the head triple of the best-scoring person, normalized to the frame.
fn decode_landmarks(
    rows: &[Vec<f32>],
    placement: &Letterbox,
    confidence: f64,
    frame_w: u32,
    frame_h: u32,
) -> Option<LandmarkTriple> {
    let min_len = KEYPOINT_OFFSET + (RIGHT_EAR + 1) * KEYPOINT_STRIDE;
    let best = rows
        .iter()
        .filter(|row| row.len() >= min_len && row[4] as f64 >= confidence)
        .max_by(|a, b| a[4].partial_cmp(&b[4]).unwrap_or(std::cmp::Ordering::Equal))?;

    let point = |k: usize| {
        let base = KEYPOINT_OFFSET + k * KEYPOINT_STRIDE;
        let (x, y) = placement.unmap(best[base] as f64, best[base + 1] as f64);
        (
            (x / frame_w as f64).clamp(0.0, 1.0),
            (y / frame_h as f64).clamp(0.0, 1.0),
        )
    };

    Some(LandmarkTriple::new(
        point(NOSE),
        point(LEFT_EAR),
        point(RIGHT_EAR),
    ))
}
