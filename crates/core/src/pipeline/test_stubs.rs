//! Hand-written port stubs shared by the pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::landmark_triple::LandmarkTriple;
use crate::detection::domain::pose_estimator::PoseEstimator;
use crate::orientation::domain::direction::Direction;
use crate::session::domain::session::{ScreenshotRecord, Session};
use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, SourceMetadata};

pub fn gray_frame(width: u32, height: u32, index: usize) -> Frame {
    Frame::new(vec![128u8; (width * height * 3) as usize], width, height, 3, index)
}

/// Landmarks whose asymmetry ratio is 0.5 toward `direction` (0 for forward).
pub fn landmarks_facing(direction: Direction) -> LandmarkTriple {
    let (d_left, d_right) = match direction {
        Direction::Forward => (0.1, 0.1),
        Direction::Left => (0.1, 0.3),
        Direction::Right => (0.3, 0.1),
    };
    LandmarkTriple::new((0.5, 0.5), (0.5 - d_left, 0.5), (0.5 + d_right, 0.5))
}

/// Returns the same boxes for every frame.
pub struct StubDetector {
    pub faces: Vec<FaceBox>,
    pub fail: bool,
}

impl StubDetector {
    pub fn with_faces(faces: Vec<FaceBox>) -> Self {
        Self { faces, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            faces: Vec::new(),
            fail: true,
        }
    }
}

impl FaceDetector for StubDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        if self.fail {
            return Err("detector failed".into());
        }
        Ok(self.faces.clone())
    }
}

/// Pops one scripted answer per call, repeating the last one when exhausted.
///
/// Records the size of every frame it is given.
pub struct StubEstimator {
    script: VecDeque<Option<LandmarkTriple>>,
    last: Option<LandmarkTriple>,
    pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl StubEstimator {
    pub fn scripted(script: Vec<Option<LandmarkTriple>>) -> Self {
        Self {
            script: script.into(),
            last: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(direction: Direction) -> Self {
        Self::scripted(vec![Some(landmarks_facing(direction))])
    }
}

impl PoseEstimator for StubEstimator {
    fn estimate(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<LandmarkTriple>, Box<dyn std::error::Error>> {
        self.seen.lock().unwrap().push((frame.width(), frame.height()));
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

/// Yields `count` gray frames, or fails to open.
pub struct StubSource {
    pub count: usize,
    pub fail_open: bool,
    pub closed: Arc<AtomicBool>,
}

impl StubSource {
    pub fn frames(count: usize) -> Self {
        Self {
            count,
            fail_open: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::frames(0)
        }
    }
}

impl FrameSource for StubSource {
    fn open(&mut self) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        if self.fail_open {
            return Err("no camera".into());
        }
        self.closed.store(false, Ordering::SeqCst);
        Ok(SourceMetadata {
            width: 32,
            height: 24,
            fps: 30.0,
            description: "stub".into(),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        Box::new((0..self.count).map(|i| Ok(gray_frame(32, 24, i))))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory store recording every call.
#[derive(Default)]
pub struct RecordingStore {
    pub created: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<String>>,
    pub captures: Mutex<Vec<(String, String, Direction, usize)>>,
    pub previews: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_captures: bool,
}

impl SessionStore for RecordingStore {
    fn create_session(&self, user_id: &str) -> Result<String, StoreError> {
        let mut created = self.created.lock().unwrap();
        created.push(user_id.to_string());
        Ok(format!("session-{}", created.len()))
    }

    fn finish_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.finished.lock().unwrap().push(session_id.to_string());
        Ok(())
    }

    fn persist_capture(
        &self,
        session_id: &str,
        user_id: &str,
        image: &[u8],
        direction: Direction,
        _captured_at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        if self.fail_captures {
            return Err(StoreError::UnexpectedResponse("upload refused".into()));
        }
        let mut captures = self.captures.lock().unwrap();
        captures.push((
            session_id.to_string(),
            user_id.to_string(),
            direction,
            image.len(),
        ));
        Ok(format!("mem://{session_id}/{}", captures.len()))
    }

    fn set_preview_if_absent(&self, _session_id: &str, url: &str) -> Result<(), StoreError> {
        self.previews.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn session(&self, _session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(None)
    }

    fn screenshots(&self, _session_id: &str) -> Result<Vec<ScreenshotRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn sessions_for_user(&self, _user_id: &str, _limit: usize) -> Result<Vec<Session>, StoreError> {
        Ok(Vec::new())
    }

    fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.deleted.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}
