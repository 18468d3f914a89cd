use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_CAMERA_DEVICE, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_QUEUE,
    DEFAULT_CAPTURE_WIDTH, DEFAULT_COOLDOWN_SECS, DEFAULT_DETECTOR_CONFIDENCE,
    DEFAULT_DIRECTION_THRESHOLD, DEFAULT_PERSISTENCE_SECS, DEFAULT_POSE_CONFIDENCE,
    DEFAULT_PREVIEW_QUALITY,
};

/// Upper bound for the trigger durations (one day).
pub const MAX_DURATION_SECS: f64 = 86_400.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which faces the pose estimator looks at, and on what pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analyse every detected face instead of only the most confident one.
    pub multi_face: bool,
    /// Run the pose estimator on each face crop instead of the full frame.
    pub crop_before_pose: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            multi_face: false,
            crop_before_pose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub threshold: f64,
    pub persistence_secs: f64,
    pub cooldown_secs: f64,
}

impl TriggerConfig {
    pub fn persistence(&self) -> Duration {
        Duration::from_secs_f64(self.persistence_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIRECTION_THRESHOLD,
            persistence_secs: DEFAULT_PERSISTENCE_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device node, capture-device name or any ffmpeg-readable URL/path.
    pub device: String,
    /// Explicit ffmpeg input format (`v4l2`, `avfoundation`, `dshow`).
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            format: None,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub analysis: AnalysisConfig,
    pub trigger: TriggerConfig,
    pub camera: CameraConfig,
    pub detector_confidence: f64,
    pub pose_confidence: f64,
    pub preview_quality: u8,
    pub capture_queue: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            trigger: TriggerConfig::default(),
            camera: CameraConfig::default(),
            detector_confidence: DEFAULT_DETECTOR_CONFIDENCE,
            pose_confidence: DEFAULT_POSE_CONFIDENCE,
            preview_quality: DEFAULT_PREVIEW_QUALITY,
            capture_queue: DEFAULT_CAPTURE_QUEUE,
        }
    }
}

impl MonitorConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the per-user config file, falling back to defaults when absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trigger;
        if !(0.0..1.0).contains(&t.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be in [0, 1), got {}",
                t.threshold
            )));
        }
        for (name, value) in [
            ("persistence", t.persistence_secs),
            ("cooldown", t.cooldown_secs),
        ] {
            if !(0.0..=MAX_DURATION_SECS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0 and {MAX_DURATION_SECS} seconds, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("detector_confidence", self.detector_confidence),
            ("pose_confidence", self.pose_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if !(1..=100).contains(&self.preview_quality) {
            return Err(ConfigError::Invalid(format!(
                "preview_quality must be between 1 and 100, got {}",
                self.preview_quality
            )));
        }
        if self.capture_queue == 0 {
            return Err(ConfigError::Invalid("capture_queue must be at least 1".into()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera size must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        Ok(())
    }
}
