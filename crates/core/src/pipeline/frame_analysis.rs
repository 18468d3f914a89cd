use serde::{Deserialize, Serialize};

use crate::detection::domain::face_box::FaceBox;
use crate::orientation::domain::direction::Direction;
use crate::orientation::domain::direction_classifier::Classification;

/// One detected face in a [`FrameAnalysis`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    pub bbox: [i32; 4],
    pub confidence: f64,
    /// Set for faces whose pose was analysed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_confidence: Option<f64>,
}

impl FaceResult {
    pub fn detected(face: &FaceBox) -> Self {
        Self {
            bbox: face.as_array(),
            confidence: face.confidence,
            direction: None,
            pose_confidence: None,
        }
    }

    pub fn set_pose(&mut self, classification: Classification) {
        self.direction = Some(classification.direction);
        self.pose_confidence = Some(classification.confidence);
    }
}

/// Per-frame result shared by `/detect`, `/detect_result` and the monitor loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub direction: Direction,
    pub confidence: f64,
    pub face_detected: bool,
    /// Detector score of the primary face, 0 when none.
    pub face_confidence: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Primary (most confident) face.
    pub bbox: Option<[i32; 4]>,
    /// All detected faces, most confident first.
    pub faces: Vec<FaceResult>,
}

impl FrameAnalysis {
    pub fn classification(&self) -> Classification {
        Classification {
            direction: self.direction,
            confidence: self.confidence,
        }
    }
}
