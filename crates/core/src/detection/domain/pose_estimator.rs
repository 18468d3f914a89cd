use crate::detection::domain::landmark_triple::LandmarkTriple;
use crate::shared::frame::Frame;

/// Domain interface for head-pose landmark estimation.
///
/// Returns `None` when no usable head is visible in `frame`. Coordinates
/// are normalized to the frame passed in, which may be a face crop.
pub trait PoseEstimator: Send {
    fn estimate(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<LandmarkTriple>, Box<dyn std::error::Error>>;
}
