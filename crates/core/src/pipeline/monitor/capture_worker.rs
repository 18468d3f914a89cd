use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};

use crate::orientation::domain::direction::Direction;
use crate::pipeline::monitor::session_context::SessionIds;
use crate::session::domain::session_store::SessionStore;
use crate::shared::frame::Frame;
use crate::video::domain::image_codec::ImageCodec;

/// A screenshot the trigger decided to take.
pub struct CaptureJob {
    pub ids: SessionIds,
    /// Annotated frame, owned by the job.
    pub frame: Frame,
    pub direction: Direction,
    pub captured_at: DateTime<Utc>,
}

/// Spawns the thread that encodes and persists captures.
///
/// The thread exits once every sender is dropped and the queue is drained,
/// returning how many captures were persisted.
pub fn spawn_capture_worker(
    store: Arc<dyn SessionStore>,
    codec: Arc<dyn ImageCodec>,
    capacity: usize,
) -> (Sender<CaptureJob>, JoinHandle<usize>) {
    let (job_tx, job_rx) = crossbeam_channel::bounded::<CaptureJob>(capacity.max(1));
    let handle = std::thread::spawn(move || {
        let mut persisted = 0;
        for job in job_rx {
            if persist(&*store, &*codec, &job) {
                persisted += 1;
            }
        }
        persisted
    });
    (job_tx, handle)
}

/// Queues a job without blocking. A full or closed queue drops it.
pub fn enqueue(job_tx: &Sender<CaptureJob>, job: CaptureJob) -> bool {
    match job_tx.try_send(job) {
        Ok(()) => true,
        Err(TrySendError::Full(job)) => {
            log::warn!(
                "Capture queue full, dropping {} capture for session {}",
                job.direction,
                job.ids.session_id
            );
            false
        }
        Err(TrySendError::Disconnected(job)) => {
            log::warn!(
                "Capture worker gone, dropping {} capture for session {}",
                job.direction,
                job.ids.session_id
            );
            false
        }
    }
}

fn persist(store: &dyn SessionStore, codec: &dyn ImageCodec, job: &CaptureJob) -> bool {
    let png = match codec.encode_png(&job.frame) {
        Ok(png) => png,
        Err(e) => {
            log::warn!("Failed to encode capture: {e}");
            return false;
        }
    };

    let url = match store.persist_capture(
        &job.ids.session_id,
        &job.ids.user_id,
        &png,
        job.direction,
        job.captured_at,
    ) {
        Ok(url) => url,
        Err(e) => {
            log::warn!(
                "Failed to persist {} capture for session {}: {e}",
                job.direction,
                job.ids.session_id
            );
            return false;
        }
    };
    log::info!("Saved {} capture: {url}", job.direction);

    if let Err(e) = store.set_preview_if_absent(&job.ids.session_id, &url) {
        log::warn!("Failed to set session preview: {e}");
    }
    true
}
