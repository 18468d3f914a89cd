use std::time::Instant;

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::pose_estimator::PoseEstimator;
use crate::orientation::domain::direction_classifier::{Classification, DirectionClassifier};
use crate::pipeline::frame_analysis::{FaceResult, FrameAnalysis};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::monitor_config::AnalysisConfig;

/// Per-frame face → pose → direction pipeline.
///
/// `AnalysisConfig` picks between analysing only the most confident face or
/// all of them, and between pose estimation on face crops or on the whole
/// frame.
pub struct FrameAnalyzer {
    detector: Box<dyn FaceDetector>,
    estimator: Box<dyn PoseEstimator>,
    classifier: DirectionClassifier,
    config: AnalysisConfig,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        estimator: Box<dyn PoseEstimator>,
        classifier: DirectionClassifier,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            detector,
            estimator,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> AnalysisConfig {
        self.config
    }

    pub fn analyze(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FrameAnalysis, Box<dyn std::error::Error>> {
        let t0 = Instant::now();
        let mut boxes = self.detector.detect(frame)?;
        FaceBox::sort_by_confidence(&mut boxes);
        logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
        logger.metric("faces", boxes.len() as f64);

        let t1 = Instant::now();
        let mut faces: Vec<FaceResult> = boxes.iter().map(FaceResult::detected).collect();
        let analysed = if self.config.multi_face {
            faces.len()
        } else {
            faces.len().min(1)
        };

        let overall = if self.config.crop_before_pose {
            for (face, bbox) in faces.iter_mut().zip(&boxes).take(analysed) {
                let [x1, y1, x2, y2] = bbox.as_array();
                let Some(crop) = frame.crop(x1, y1, x2, y2) else {
                    continue;
                };
                let landmarks = self.estimator.estimate(&crop)?;
                face.set_pose(self.classifier.classify(landmarks.as_ref()));
            }
            self.overall(&faces[..analysed])
        } else {
            let landmarks = self.estimator.estimate(frame)?;
            let classification = self.classifier.classify(landmarks.as_ref());
            if let Some(primary) = faces.first_mut() {
                primary.set_pose(classification);
            }
            classification
        };
        logger.timing("pose", t1.elapsed().as_secs_f64() * 1000.0);

        let primary = boxes.first();
        log::debug!(
            "frame {}: {} ({:.2}), {} face(s)",
            frame.index(),
            overall.direction,
            overall.confidence,
            boxes.len()
        );

        Ok(FrameAnalysis {
            direction: overall.direction,
            confidence: overall.confidence,
            face_detected: primary.is_some(),
            face_confidence: primary.map_or(0.0, |b| b.confidence),
            frame_width: frame.width(),
            frame_height: frame.height(),
            bbox: primary.map(FaceBox::as_array),
            faces,
        })
    }

    /// First turned face in confidence order, else the primary face's result.
    fn overall(&self, analysed: &[FaceResult]) -> Classification {
        let mut classified = analysed.iter().filter_map(|f| {
            Some(Classification {
                direction: f.direction?,
                confidence: f.pose_confidence?,
            })
        });
        if !self.config.multi_face {
            return classified.next().unwrap_or(Classification::NONE);
        }

        let mut first = None;
        for c in classified {
            if c.direction.is_deviating() {
                return c;
            }
            first.get_or_insert(c);
        }
        first.unwrap_or(Classification::NONE)
    }
}
