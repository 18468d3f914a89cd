use std::sync::{Arc, Mutex};

use crate::pipeline::frame_analysis::FrameAnalysis;

/// What the monitor loop last published.
#[derive(Clone, Debug, Default)]
pub struct PreviewSnapshot {
    /// Increments on every publish; 0 means nothing published yet.
    pub seq: u64,
    pub jpeg: Option<Arc<[u8]>>,
    pub analysis: Option<FrameAnalysis>,
}

/// Latest annotated JPEG and analysis, written by the monitor loop and
/// read by HTTP handlers.
///
/// The lock is only held to swap or clone the snapshot.
#[derive(Debug, Default)]
pub struct LatestFrame {
    inner: Mutex<PreviewSnapshot>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new frame and returns its sequence number.
    pub fn publish(&self, jpeg: Vec<u8>, analysis: FrameAnalysis) -> u64 {
        let jpeg: Arc<[u8]> = jpeg.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.seq += 1;
        inner.jpeg = Some(jpeg);
        inner.analysis = Some(analysis);
        inner.seq
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn analysis(&self) -> Option<FrameAnalysis> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .analysis
            .clone()
    }

    /// Drops the published frame; the sequence keeps counting so streams
    /// never mistake a new session's first frame for an old one.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.jpeg = None;
        inner.analysis = None;
    }
}
