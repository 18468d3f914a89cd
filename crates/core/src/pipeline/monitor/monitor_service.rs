use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;

use crate::orientation::domain::capture_trigger::CaptureTrigger;
use crate::pipeline::detect_image_use_case::SharedAnalyzer;
use crate::pipeline::monitor::latest_frame::LatestFrame;
use crate::pipeline::monitor::monitor_worker::{spawn_monitor_worker, MonitorWorker};
use crate::pipeline::monitor::session_context::{SessionContext, SessionIds};
use crate::pipeline::pipeline_logger::StdoutPipelineLogger;
use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::monitor_config::MonitorConfig;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::image_codec::ImageCodec;

/// Builds a fresh, unopened camera source for each session.
pub type SourceFactory = Box<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("session {0} is already active")]
    AlreadyActive(String),
    #[error("invalid request: {0}")]
    InvalidInput(&'static str),
    #[error("camera unavailable: {0}")]
    Camera(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub active: bool,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// Owns the monitoring lifecycle: at most one session at a time.
pub struct MonitorService {
    analyzer: SharedAnalyzer,
    codec: Arc<dyn ImageCodec>,
    store: Arc<dyn SessionStore>,
    source_factory: SourceFactory,
    latest: Arc<LatestFrame>,
    config: MonitorConfig,
    active: Mutex<Option<SessionContext>>,
}

impl MonitorService {
    pub fn new(
        analyzer: SharedAnalyzer,
        codec: Arc<dyn ImageCodec>,
        store: Arc<dyn SessionStore>,
        source_factory: SourceFactory,
        config: MonitorConfig,
    ) -> Self {
        Self {
            analyzer,
            codec,
            store,
            source_factory,
            latest: Arc::new(LatestFrame::new()),
            config,
            active: Mutex::new(None),
        }
    }

    /// Opens the camera, records a new session and starts the monitor loop.
    ///
    /// The camera is opened before the store is touched, so an unavailable
    /// camera leaves no session behind.
    pub fn start(&self, user_id: &str) -> Result<String, MonitorError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(MonitorError::InvalidInput("user_id is required"));
        }

        let mut active = self.lock_active();
        if let Some(context) = active.take() {
            if !context.worker_finished() {
                let session_id = context.ids.session_id.clone();
                *active = Some(context);
                return Err(MonitorError::AlreadyActive(session_id));
            }
            // The loop ended by itself (camera lost); close out that session.
            self.finish(context)?;
        }

        let mut source = (self.source_factory)();
        let metadata = source
            .open()
            .map_err(|e| MonitorError::Camera(e.to_string()))?;

        let session_id = match self.store.create_session(user_id) {
            Ok(id) => id,
            Err(e) => {
                source.close();
                return Err(e.into());
            }
        };

        self.latest.clear();
        let ids = SessionIds {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker = MonitorWorker {
            ids: ids.clone(),
            source,
            analyzer: self.analyzer.clone(),
            trigger: CaptureTrigger::from_config(&self.config.trigger),
            codec: self.codec.clone(),
            store: self.store.clone(),
            latest: self.latest.clone(),
            logger: Box::new(StdoutPipelineLogger::default()),
            preview_quality: self.config.preview_quality,
            capture_queue: self.config.capture_queue,
        };
        let handle = spawn_monitor_worker(worker, cancelled.clone());

        log::info!(
            "Started session {session_id} for user {user_id} on {} ({}x{})",
            metadata.description,
            metadata.width,
            metadata.height
        );
        *active = Some(SessionContext::new(ids, cancelled, handle));
        Ok(session_id)
    }

    /// Stops the running session, if any, and returns its id.
    pub fn stop(&self) -> Result<Option<String>, MonitorError> {
        let mut active = self.lock_active();
        let Some(context) = active.take() else {
            return Ok(None);
        };
        let session_id = context.ids.session_id.clone();
        self.finish(context)?;
        Ok(Some(session_id))
    }

    /// Deletes a stored session. The running session cannot be deleted;
    /// one whose loop already ended is closed out first.
    pub fn delete_session(&self, session_id: &str) -> Result<(), MonitorError> {
        let mut active = self.lock_active();
        if active
            .as_ref()
            .is_some_and(|context| context.ids.session_id == session_id)
        {
            if let Some(context) = active.take() {
                if !context.worker_finished() {
                    *active = Some(context);
                    return Err(MonitorError::AlreadyActive(session_id.to_string()));
                }
                self.finish(context)?;
            }
        }
        self.store.delete_session(session_id)?;
        Ok(())
    }

    pub fn status(&self) -> MonitorStatus {
        match self.lock_active().as_ref() {
            Some(context) => MonitorStatus {
                active: !context.worker_finished(),
                session_id: Some(context.ids.session_id.clone()),
                user_id: Some(context.ids.user_id.clone()),
            },
            None => MonitorStatus::default(),
        }
    }

    pub fn latest(&self) -> &Arc<LatestFrame> {
        &self.latest
    }

    pub fn analyzer(&self) -> SharedAnalyzer {
        self.analyzer.clone()
    }

    pub fn codec(&self) -> Arc<dyn ImageCodec> {
        self.codec.clone()
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn finish(&self, context: SessionContext) -> Result<(), MonitorError> {
        let session_id = context.ids.session_id.clone();
        match context.shutdown() {
            Some(report) => log::info!(
                "Stopped session {session_id}: {} frames, {} skipped, {}/{} captures saved",
                report.frames,
                report.skipped,
                report.captures_persisted,
                report.captures_queued
            ),
            None => log::warn!("Session {session_id} ended without a worker report"),
        }
        self.latest.clear();
        self.store.finish_session(&session_id)?;
        Ok(())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<SessionContext>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use crate::detection::domain::face_box::FaceBox;
    use crate::orientation::domain::direction::Direction;
    use crate::orientation::domain::direction_classifier::DirectionClassifier;
    use crate::pipeline::frame_analyzer::FrameAnalyzer;
    use crate::pipeline::test_stubs::{RecordingStore, StubDetector, StubEstimator, StubSource};
    use crate::shared::monitor_config::AnalysisConfig;
    use crate::video::infrastructure::image_crate_codec::ImageCrateCodec;

    struct Fixture {
        service: MonitorService,
        store: Arc<RecordingStore>,
        closed: Arc<AtomicBool>,
    }

    fn fixture(frames: usize, camera_ok: bool) -> Fixture {
        let store = Arc::new(RecordingStore::default());
        let closed = Arc::new(AtomicBool::new(false));
        let source_closed = closed.clone();
        let factory: SourceFactory = Box::new(move || -> Box<dyn FrameSource> {
            Box::new(StubSource {
                count: frames,
                fail_open: !camera_ok,
                closed: source_closed.clone(),
            })
        });
        let analyzer = FrameAnalyzer::new(
            Box::new(StubDetector::with_faces(vec![FaceBox::new(2.0, 2.0, 12.0, 12.0, 0.9)])),
            Box::new(StubEstimator::always(Direction::Right)),
            DirectionClassifier::default(),
            AnalysisConfig::default(),
        );
        let service = MonitorService::new(
            Arc::new(Mutex::new(analyzer)),
            Arc::new(ImageCrateCodec::new()),
            store.clone(),
            factory,
            MonitorConfig::default(),
        );
        Fixture {
            service,
            store,
            closed,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_and_stop_lifecycle() {
        let f = fixture(usize::MAX, true);
        let session_id = f.service.start("user-1").unwrap();
        assert_eq!(session_id, "session-1");

        let status = f.service.status();
        assert!(status.active);
        assert_eq!(status.session_id.as_deref(), Some("session-1"));
        assert_eq!(status.user_id.as_deref(), Some("user-1"));

        wait_until(|| f.service.latest().snapshot().seq > 0);
        assert_eq!(
            f.service.latest().analysis().unwrap().direction,
            Direction::Right
        );

        assert_eq!(f.service.stop().unwrap(), Some("session-1".to_string()));
        assert!(f.closed.load(Ordering::SeqCst));
        assert_eq!(*f.store.finished.lock().unwrap(), vec!["session-1".to_string()]);
        assert_eq!(f.service.status(), MonitorStatus::default());
        assert!(f.service.latest().snapshot().jpeg.is_none());
    }

    #[test]
    fn test_second_start_is_rejected() {
        let f = fixture(usize::MAX, true);
        f.service.start("user-1").unwrap();
        assert!(matches!(
            f.service.start("user-2"),
            Err(MonitorError::AlreadyActive(id)) if id == "session-1"
        ));
        assert_eq!(f.store.created.lock().unwrap().len(), 1);
        f.service.stop().unwrap();
    }

    #[test]
    fn test_stop_without_session_is_a_no_op() {
        let f = fixture(0, true);
        assert_eq!(f.service.stop().unwrap(), None);
        assert!(f.store.finished.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_camera_creates_no_session() {
        let f = fixture(0, false);
        assert!(matches!(
            f.service.start("user-1"),
            Err(MonitorError::Camera(_))
        ));
        assert!(f.store.created.lock().unwrap().is_empty());
        assert!(!f.service.status().active);
    }

    #[test]
    fn test_blank_user_is_rejected() {
        let f = fixture(0, true);
        assert!(matches!(
            f.service.start("  "),
            Err(MonitorError::InvalidInput(_))
        ));
        assert!(f.store.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_after_camera_ended_finishes_previous_session() {
        let f = fixture(2, true);
        f.service.start("user-1").unwrap();
        wait_until(|| !f.service.status().active);
        assert_eq!(
            f.service.status().session_id.as_deref(),
            Some("session-1")
        );

        assert_eq!(f.service.start("user-1").unwrap(), "session-2");
        assert_eq!(*f.store.finished.lock().unwrap(), vec!["session-1".to_string()]);
        f.service.stop().unwrap();
    }

    #[test]
    fn test_running_session_cannot_be_deleted() {
        let f = fixture(usize::MAX, true);
        f.service.start("user-1").unwrap();
        assert!(matches!(
            f.service.delete_session("session-1"),
            Err(MonitorError::AlreadyActive(id)) if id == "session-1"
        ));
        assert!(f.service.status().active);
        assert!(f.store.deleted.lock().unwrap().is_empty());

        f.service.stop().unwrap();
        f.service.delete_session("session-1").unwrap();
        assert_eq!(*f.store.deleted.lock().unwrap(), vec!["session-1".to_string()]);
    }

    #[test]
    fn test_deleting_ended_session_closes_it_first() {
        let f = fixture(2, true);
        f.service.start("user-1").unwrap();
        wait_until(|| !f.service.status().active);

        f.service.delete_session("session-1").unwrap();
        assert_eq!(*f.store.finished.lock().unwrap(), vec!["session-1".to_string()]);
        assert_eq!(*f.store.deleted.lock().unwrap(), vec!["session-1".to_string()]);
        assert_eq!(f.service.status(), MonitorStatus::default());
    }
}
