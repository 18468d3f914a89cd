pub const FACE_MODEL_NAME: &str = "yolov5n-face.onnx";
pub const POSE_MODEL_NAME: &str = "yolov8n-pose.onnx";

/// Face detector confidence cut-off.
pub const DEFAULT_DETECTOR_CONFIDENCE: f64 = 0.4;
/// Minimum person score for the pose estimator to report landmarks.
pub const DEFAULT_POSE_CONFIDENCE: f64 = 0.5;

/// |ratio| above which a head counts as turned.
pub const DEFAULT_DIRECTION_THRESHOLD: f64 = 0.25;
pub const DEFAULT_PERSISTENCE_SECS: f64 = 3.5;
pub const DEFAULT_COOLDOWN_SECS: f64 = 5.0;

pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;

/// JPEG quality for streamed preview frames.
pub const DEFAULT_PREVIEW_QUALITY: u8 = 85;

/// Pending screenshot jobs before new ones are dropped.
pub const DEFAULT_CAPTURE_QUEUE: usize = 4;

pub const APP_DIR_NAME: &str = "Headwatch";

pub const SCREENSHOT_BUCKET: &str = "detection-screenshots";
