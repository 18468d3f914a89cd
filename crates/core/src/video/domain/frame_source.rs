use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate; 0.0 when the source doesn't report one.
    pub fps: f64,
    pub description: String,
}

/// A live or recorded stream of frames, such as a webcam.
///
/// Implementations handle device and codec details while the monitor loop
/// works with the abstract `Frame` type.
pub trait FrameSource: Send {
    /// Acquires the device and returns what it will deliver.
    fn open(&mut self) -> Result<SourceMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}
