pub mod face_box;
pub mod face_detector;
pub mod landmark_triple;
pub mod pose_estimator;
