pub mod capture_trigger;
pub mod direction;
pub mod direction_classifier;
