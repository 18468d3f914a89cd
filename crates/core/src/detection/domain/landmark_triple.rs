/// Nose and both ears, normalized to `[0, 1]²` of the frame the estimator saw.
///
/// "Left" and "right" follow the subject's anatomy, not the image side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkTriple {
    pub nose: (f64, f64),
    pub left_ear: (f64, f64),
    pub right_ear: (f64, f64),
}

impl LandmarkTriple {
    pub fn new(nose: (f64, f64), left_ear: (f64, f64), right_ear: (f64, f64)) -> Self {
        Self {
            nose,
            left_ear,
            right_ear,
        }
    }

    /// Euclidean nose-to-ear distances `(left, right)`.
    pub fn ear_distances(&self) -> (f64, f64) {
        (
            distance(self.nose, self.left_ear),
            distance(self.nose, self.right_ear),
        )
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
