use std::sync::Arc;
use std::time::Instant;

use crate::assets::AssetSource;
use crate::detector::FaceDetector;
use crate::error::EngineError;
use crate::frame::Frame;
use crate::handle::{DetectorBinding, LivenessBinding};
use crate::liveness::LivenessScorer;
use crate::types::{DetectionResult, Orientation};

/// Per-frame orchestration: face detection followed by liveness scoring of
/// the first face.
///
/// Only single-face liveness is supported. When the detector reports
/// several faces, every face after the first is discarded unscored.
pub struct DetectionPipeline {
    detector: FaceDetector,
    scorer: LivenessScorer,
}

impl DetectionPipeline {
    pub fn new(detector: FaceDetector, scorer: LivenessScorer) -> Self {
        Self { detector, scorer }
    }

    /// Create both components and load their models, detector first.
    ///
    /// Any failure drops whatever was already allocated, so no handle
    /// outlives a failed start.
    pub fn init(
        detector: Arc<dyn DetectorBinding>,
        liveness: Arc<dyn LivenessBinding>,
        assets: &dyn AssetSource,
    ) -> Result<Self, EngineError> {
        let mut detector = FaceDetector::new(detector)?;
        let mut scorer = LivenessScorer::new(liveness)?;

        detector.load_model(assets)?;
        scorer.load_model(assets)?;

        tracing::info!(
            liveness_models = scorer.configs().len(),
            "detection pipeline ready"
        );
        Ok(Self::new(detector, scorer))
    }

    /// Run one NV21 frame through detection and liveness scoring.
    ///
    /// `time_ms` of the result covers the liveness call only. A frame with
    /// no face yields `DetectionResult::default()`.
    pub fn process(
        &mut self,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
    ) -> Result<DetectionResult, EngineError> {
        let faces = self.detector.detect(yuv, width, height, orientation)?;
        let found = faces.len();
        let Some(mut face) = faces.into_iter().next() else {
            return Ok(DetectionResult::default());
        };
        if found > 1 {
            tracing::trace!(discarded = found - 1, "scoring first face only");
        }

        let begin = Instant::now();
        face.confidence = self
            .scorer
            .detect(yuv, width, height, orientation, &face)?;
        let time_ms = begin.elapsed().as_millis() as u64;

        Ok(DetectionResult::from_face(&face, time_ms))
    }

    pub fn process_frame(&mut self, frame: &Frame) -> Result<DetectionResult, EngineError> {
        self.process(&frame.data, frame.width, frame.height, frame.orientation)
    }

    pub fn detector(&self) -> &FaceDetector {
        &self.detector
    }

    pub fn scorer(&self) -> &LivenessScorer {
        &self.scorer
    }

    /// Release both native handles.
    pub fn destroy(self) {
        self.detector.destroy();
        self.scorer.destroy();
    }
}
