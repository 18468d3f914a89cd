pub mod execution_provider;
pub mod math;
pub mod onnx_pose_estimator;
pub mod onnx_yolo_detector;
