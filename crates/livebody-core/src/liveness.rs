//! Anti-spoofing scorer over a set of native liveness sub-models.
//!
//! The scorer returns the raw score produced by the native ensemble for one
//! face box. It never applies a threshold: deciding whether a score means
//! "live" belongs to whoever displays the result.

use std::sync::Arc;

use crate::assets::AssetSource;
use crate::error::EngineError;
use crate::frame::validate_nv21;
use crate::handle::{LivenessBinding, NativeHandle};
use crate::model_config::{read_model_configs, ModelConfig};
use crate::types::{FaceBox, Orientation};

/// Liveness scorer backed by one native liveness handle.
pub struct LivenessScorer {
    handle: NativeHandle<dyn LivenessBinding>,
    configs: Vec<ModelConfig>,
}

impl LivenessScorer {
    pub fn new(binding: Arc<dyn LivenessBinding>) -> Result<Self, EngineError> {
        let handle = NativeHandle::acquire(binding)?;
        Ok(Self {
            handle,
            configs: Vec::new(),
        })
    }

    /// Parse `live/config.json` and load every listed sub-model.
    ///
    /// An empty, malformed or unreadable config list fails here without
    /// calling the native loader.
    pub fn load_model(&mut self, assets: &dyn AssetSource) -> Result<(), EngineError> {
        let configs = read_model_configs(assets).map_err(|e| {
            tracing::error!(error = %e, "parse model config failed");
            EngineError::Config(e)
        })?;

        let status = self
            .handle
            .binding()
            .load_model(self.handle.raw(), assets, &configs);
        if status != 0 {
            tracing::error!(status, models = configs.len(), "liveness model load failed");
            return Err(EngineError::ModelLoadFailed {
                component: self.handle.kind(),
                status,
            });
        }

        tracing::info!(
            handle = self.handle.raw(),
            models = ?configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "liveness models loaded"
        );
        self.configs = configs;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        !self.configs.is_empty()
    }

    /// Sub-models loaded by the last successful `load_model`.
    pub fn configs(&self) -> &[ModelConfig] {
        &self.configs
    }

    /// Score `face` within an NV21 frame.
    ///
    /// Same size precondition as the detector. Scores 0.0 (not live) when no
    /// model is loaded.
    pub fn detect(
        &mut self,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
        face: &FaceBox,
    ) -> Result<f32, EngineError> {
        validate_nv21(yuv, width, height)?;
        if !self.is_loaded() {
            tracing::warn!("liveness detect called before models were loaded");
            return Ok(0.0);
        }
        Ok(self
            .handle
            .binding()
            .detect_yuv(self.handle.raw(), yuv, width, height, orientation, face))
    }

    /// Release the native scorer.
    pub fn destroy(self) {
        tracing::info!(handle = self.handle.raw(), "destroying liveness scorer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::error::{ConfigError, InputError};
    use crate::model_config::CONFIG_PATH;
    use crate::scripted::{Script, ScriptedEngine, ScriptedFrame};

    const M1: &str = r#"[{"name":"m1","width":96,"height":96,"scale":1.0,"shift_x":0,"shift_y":0,"org_resize":false}]"#;

    fn scoring_engine(score: f32) -> ScriptedEngine {
        ScriptedEngine::new(Script {
            frames: vec![ScriptedFrame {
                faces: vec![],
                score,
            }],
            ..Script::default()
        })
    }

    #[test]
    fn load_forwards_parsed_configs() {
        let engine = scoring_engine(0.9);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, M1))
            .unwrap();

        assert_eq!(engine.counts().liveness_loads, 1);
        let forwarded = engine.loaded_configs();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].name, "m1");
        assert_eq!(scorer.configs(), forwarded.as_slice());
    }

    #[test]
    fn empty_config_never_reaches_native_loader() {
        let engine = scoring_engine(0.9);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        let err = scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, "[]"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::NoModels)));
        assert_eq!(engine.counts().liveness_loads, 0);
        assert!(!scorer.is_loaded());
    }

    #[test]
    fn malformed_config_never_reaches_native_loader() {
        let engine = scoring_engine(0.9);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        let err = scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, "{\"name\":\"m1\""))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::Malformed(_))));
        assert_eq!(engine.counts().liveness_loads, 0);
    }

    #[test]
    fn missing_config_asset_is_a_load_failure() {
        let engine = scoring_engine(0.9);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        let err = scorer.load_model(&MemoryAssets::new()).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::Read { .. })));
        assert!(!err.is_frame_local());
    }

    #[test]
    fn native_load_failure_keeps_status() {
        let engine = ScriptedEngine::new(Script {
            liveness_load_status: 2,
            ..Script::default()
        });
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        let err = scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, M1))
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelLoadFailed { status: 2, .. }));
        assert!(!scorer.is_loaded());
    }

    #[test]
    fn score_is_passed_through_unthresholded() {
        let engine = scoring_engine(0.12);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, M1))
            .unwrap();

        let face = FaceBox::new(100, 100, 300, 300, 0.99);
        let score = scorer
            .detect(&vec![0u8; 460_800], 640, 480, Orientation::NONE, &face)
            .unwrap();
        assert_eq!(score, 0.12);
        assert_eq!(engine.scored_faces(), vec![face]);
    }

    #[test]
    fn rejects_wrong_size_without_native_call() {
        let engine = scoring_engine(0.9);
        let mut scorer = LivenessScorer::new(engine.liveness()).unwrap();
        scorer
            .load_model(&MemoryAssets::new().with(CONFIG_PATH, M1))
            .unwrap();

        let face = FaceBox::new(0, 0, 1, 1, 1.0);
        let err = scorer
            .detect(&vec![0u8; 460_801], 640, 480, Orientation::NONE, &face)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(InputError::FrameSize { .. })));
        assert_eq!(engine.counts().liveness_calls, 0);
    }
}
