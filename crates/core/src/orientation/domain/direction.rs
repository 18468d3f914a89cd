use std::fmt;

use serde::{Deserialize, Serialize};

/// Head-turn direction label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Forward,
    Left,
    Right,
}

impl Direction {
    /// Whether the head is turned away from the camera.
    pub fn is_deviating(self) -> bool {
        self != Direction::Forward
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "FORWARD",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
