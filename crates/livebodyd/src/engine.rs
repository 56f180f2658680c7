use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use livebody_core::handle::Component;
use livebody_core::{
    DetectionPipeline, DetectorBinding, DirAssets, FrameDispatcher, FrameOutcome,
    LivenessBinding, Script, ScriptedEngine, ThresholdCell,
};
use tokio::sync::mpsc;

use crate::config::Config;

type Bindings = (Arc<dyn DetectorBinding>, Arc<dyn LivenessBinding>);

/// Bring up the engine and move it onto the dispatch worker thread.
///
/// The detector is loaded before the liveness models. Any failure here is
/// fatal: handles acquired so far are released before returning.
pub fn start(config: &Config) -> Result<(FrameDispatcher, mpsc::UnboundedReceiver<FrameOutcome>)> {
    let (detector, liveness) = bindings(config)?;

    tracing::info!(
        asset_dir = %config.asset_dir.display(),
        detector = detector.kind(),
        liveness = liveness.kind(),
        "loading models"
    );
    let assets = DirAssets::new(&config.asset_dir);
    let pipeline = DetectionPipeline::init(detector, liveness, &assets)
        .context("failed to initialise detection pipeline")?;
    tracing::info!(models = pipeline.scorer().configs().len(), "models loaded");

    let threshold = ThresholdCell::new(config.threshold);
    let (dispatcher, outcomes) =
        FrameDispatcher::spawn(pipeline, threshold).context("failed to start dispatch worker")?;
    Ok((dispatcher, outcomes))
}

fn bindings(config: &Config) -> Result<Bindings> {
    if let Some(path) = &config.script_path {
        let engine = scripted(path)?;
        return Ok((engine.detector(), engine.liveness()));
    }
    native()
}

fn scripted(path: &Path) -> Result<ScriptedEngine> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read engine script {}", path.display()))?;
    let script = Script::from_json(&json)
        .with_context(|| format!("malformed engine script {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        frames = script.frames.len(),
        "using scripted engine"
    );
    Ok(ScriptedEngine::new(script))
}

#[cfg(feature = "native")]
fn native() -> Result<Bindings> {
    use livebody_core::{ffi, init_engine, EngineState};

    match init_engine(ffi::probe) {
        EngineState::Available => tracing::info!("native engine available"),
        EngineState::Unavailable(reason) => {
            bail!("native engine unavailable: {reason}")
        }
    }
    Ok((
        Arc::new(ffi::NativeDetector::default()),
        Arc::new(ffi::NativeLiveness::default()),
    ))
}

#[cfg(not(feature = "native"))]
fn native() -> Result<Bindings> {
    bail!("built without the `native` feature; pass --script to use the scripted engine")
}
