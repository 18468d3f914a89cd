//! Nose-to-ear asymmetry classification.
//!
//! When the head turns, the nose moves toward one ear: the nose-to-ear
//! distance on the side the subject is facing shrinks while the other grows.

use serde::Serialize;

use crate::detection::domain::landmark_triple::LandmarkTriple;
use crate::orientation::domain::direction::Direction;
use crate::shared::constants::DEFAULT_DIRECTION_THRESHOLD;

/// Keeps the ratio finite when both ears collapse onto the nose.
const EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub direction: Direction,
    pub confidence: f64,
}

impl Classification {
    /// The result reported when no head is visible.
    pub const NONE: Classification = Classification {
        direction: Direction::Forward,
        confidence: 0.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionClassifier {
    threshold: f64,
}

impl DirectionClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, landmarks: Option<&LandmarkTriple>) -> Classification {
        let Some(landmarks) = landmarks else {
            return Classification::NONE;
        };

        let ratio = asymmetry_ratio(landmarks);
        let magnitude = ratio.abs();
        if ratio > self.threshold {
            Classification {
                direction: Direction::Left,
                confidence: magnitude.min(1.0),
            }
        } else if ratio < -self.threshold {
            Classification {
                direction: Direction::Right,
                confidence: magnitude.min(1.0),
            }
        } else {
            Classification {
                direction: Direction::Forward,
                confidence: 1.0 - magnitude,
            }
        }
    }
}

impl Default for DirectionClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTION_THRESHOLD)
    }
}

/// `(d_right - d_left) / (d_right + d_left + ε)`, in `(-1, 1)`.
pub fn asymmetry_ratio(landmarks: &LandmarkTriple) -> f64 {
    let (d_left, d_right) = landmarks.ear_distances();
    (d_right - d_left) / (d_right + d_left + EPSILON)
}
