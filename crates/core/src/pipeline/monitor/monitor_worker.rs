use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Utc;

use crate::orientation::domain::capture_trigger::CaptureTrigger;
use crate::orientation::domain::direction::Direction;
use crate::pipeline::detect_image_use_case::SharedAnalyzer;
use crate::pipeline::frame_analysis::FrameAnalysis;
use crate::pipeline::monitor::capture_worker::{enqueue, spawn_capture_worker, CaptureJob};
use crate::pipeline::monitor::latest_frame::LatestFrame;
use crate::pipeline::monitor::session_context::SessionIds;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::session::domain::session_store::SessionStore;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::image_codec::ImageCodec;

/// Consecutive read failures after which the camera is considered gone.
const MAX_CONSECUTIVE_READ_ERRORS: usize = 30;

const FORWARD_COLOR: [u8; 3] = [0, 255, 0];
const DEVIATING_COLOR: [u8; 3] = [255, 0, 0];
const BOX_THICKNESS: i32 = 3;
const ARROW_LENGTH: i32 = 80;
const ARROW_THICKNESS: i32 = 4;

/// Counters returned when the monitor loop exits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub frames: usize,
    /// Frames whose read or analysis failed.
    pub skipped: usize,
    pub captures_queued: usize,
    pub captures_persisted: usize,
}

/// Everything the monitor loop owns for one session.
///
/// `source` must already be open.
pub struct MonitorWorker {
    pub ids: SessionIds,
    pub source: Box<dyn FrameSource>,
    pub analyzer: SharedAnalyzer,
    pub trigger: CaptureTrigger,
    pub codec: Arc<dyn ImageCodec>,
    pub store: Arc<dyn SessionStore>,
    pub latest: Arc<LatestFrame>,
    pub logger: Box<dyn PipelineLogger>,
    pub preview_quality: u8,
    pub capture_queue: usize,
}

/// Runs the monitor loop on a dedicated thread until the source ends, the
/// camera keeps failing, or `cancelled` is set.
///
/// Layout: `source → analyze → trigger → [capture worker] → preview`
pub fn spawn_monitor_worker(
    worker: MonitorWorker,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<WorkerReport> {
    std::thread::spawn(move || worker.run(&cancelled))
}

impl MonitorWorker {
    fn run(self, cancelled: &AtomicBool) -> WorkerReport {
        let MonitorWorker {
            ids,
            mut source,
            analyzer,
            mut trigger,
            codec,
            store,
            latest,
            mut logger,
            preview_quality,
            capture_queue,
        } = self;

        let (capture_tx, capture_handle) =
            spawn_capture_worker(store, codec.clone(), capture_queue);
        let mut report = WorkerReport::default();
        let mut read_errors = 0;

        for frame_result in source.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }

            let mut frame = match frame_result {
                Ok(frame) => {
                    read_errors = 0;
                    frame
                }
                Err(e) => {
                    report.skipped += 1;
                    read_errors += 1;
                    log::warn!("Failed to read camera frame: {e}");
                    if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        log::error!(
                            "Camera failed {read_errors} times in a row, stopping session {}",
                            ids.session_id
                        );
                        break;
                    }
                    continue;
                }
            };

            let analysis = {
                let mut analyzer = analyzer.lock().unwrap_or_else(|e| e.into_inner());
                analyzer.analyze(&frame, logger.as_mut())
            };
            let analysis = match analysis {
                Ok(analysis) => analysis,
                Err(e) => {
                    report.skipped += 1;
                    log::warn!("Skipping frame {}: {e}", frame.index());
                    continue;
                }
            };
            log::debug!(
                "Frame {}: {} ({:.2})",
                frame.index(),
                analysis.direction,
                analysis.confidence
            );

            annotate(&mut frame, &analysis);

            if trigger.evaluate(analysis.direction, Instant::now()) {
                let job = CaptureJob {
                    ids: ids.clone(),
                    frame: frame.clone(),
                    direction: analysis.direction,
                    captured_at: Utc::now(),
                };
                if enqueue(&capture_tx, job) {
                    report.captures_queued += 1;
                    logger.info(&format!(
                        "Head turned {} for session {}, capture queued",
                        analysis.direction, ids.session_id
                    ));
                }
            }

            let t0 = Instant::now();
            match codec.encode_jpeg(&frame, preview_quality) {
                Ok(jpeg) => {
                    latest.publish(jpeg, analysis);
                }
                Err(e) => log::warn!("Failed to encode preview frame: {e}"),
            }
            logger.timing("encode", t0.elapsed().as_secs_f64() * 1000.0);

            logger.frame(frame.index());
            report.frames += 1;
        }

        source.close();
        drop(capture_tx);
        report.captures_persisted = capture_handle.join().unwrap_or_else(|_| {
            log::error!("Capture worker for session {} panicked", ids.session_id);
            0
        });
        logger.summary();
        report
    }
}

/// Outlines every detected face: green when facing forward, red when turned.
/// Turned faces also get an arrow from the box center: LEFT points toward
/// the image's right edge, RIGHT toward its left edge.
fn annotate(frame: &mut Frame, analysis: &FrameAnalysis) {
    for face in &analysis.faces {
        let color = match face.direction {
            Some(direction) if direction.is_deviating() => DEVIATING_COLOR,
            _ => FORWARD_COLOR,
        };
        let [x1, y1, x2, y2] = face.bbox;
        frame.draw_rect(x1, y1, x2, y2, color, BOX_THICKNESS);

        let reach = match face.direction {
            Some(Direction::Left) => ARROW_LENGTH,
            Some(Direction::Right) => -ARROW_LENGTH,
            _ => continue,
        };
        let (cx, cy) = ((x1 + x2) / 2, (y1 + y2) / 2);
        frame.draw_arrow(cx, cy, cx + reach, cy, color, ARROW_THICKNESS);
    }
}
