use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod engine;
mod source;

use config::Config;
use source::FrameSource;

/// Face detection and liveness daemon.
///
/// Replays raw NV21 preview frames through the single-flight detection
/// pipeline and prints one JSON result per processed frame.
#[derive(Parser)]
#[command(name = "livebodyd", version, about)]
struct Cli {
    /// File of concatenated NV21 frames (overrides LIVEBODY_FRAMES)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Engine script for the in-process engine (overrides LIVEBODY_SCRIPT)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Model asset directory (overrides LIVEBODY_ASSET_DIR)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Liveness threshold attached to results (overrides LIVEBODY_THRESHOLD)
    #[arg(long)]
    threshold: Option<f32>,

    /// Restart the frame file at end of file
    #[arg(long = "loop")]
    looping: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(frames) = self.frames {
            config.frames_path = Some(frames);
        }
        if let Some(script) = self.script {
            config.script_path = Some(script);
        }
        if let Some(assets) = self.assets {
            config.asset_dir = assets;
        }
        if let Some(threshold) = self.threshold.filter(|t| t.is_finite()) {
            config.threshold = threshold;
        }
        config.looping |= self.looping;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    Cli::parse().apply(&mut config);

    tracing::info!("livebodyd starting");

    let frames_path = config
        .frames_path
        .clone()
        .context("no frame file given; set LIVEBODY_FRAMES or pass --frames")?;

    let (dispatcher, outcomes) = engine::start(&config)?;
    let dispatcher = Arc::new(dispatcher);
    let consumer = tokio::spawn(display::consume(
        outcomes,
        config.screen_mapping(),
        tokio::io::stdout(),
    ));

    let source = FrameSource {
        path: frames_path,
        width: config.preview_width,
        height: config.preview_height,
        orientation: config.orientation,
        fps: config.fps,
        looping: config.looping,
    };
    let mut replay = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { source.replay(dispatcher).await }
    });

    tracing::info!("livebodyd ready");

    let replayed = tokio::select! {
        res = &mut replay => res,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("livebodyd shutting down");
            dispatcher.close();
            replay.await
        }
    };
    let replay_result = replayed.context("frame source task failed")?;

    let dispatcher = Arc::try_unwrap(dispatcher)
        .map_err(|_| anyhow::anyhow!("frame dispatcher still shared at shutdown"))?;
    let pipeline = tokio::task::spawn_blocking(move || dispatcher.shutdown())
        .await
        .context("dispatcher shutdown task failed")?;
    match pipeline {
        Some(pipeline) => pipeline.destroy(),
        None => tracing::warn!("detection pipeline lost with its worker"),
    }

    let shown = consumer.await.context("result consumer task failed")?;
    tracing::info!(
        results = shown.results,
        live = shown.live,
        skipped = shown.skipped,
        "livebodyd stopped"
    );

    replay_result.map(|_| ())
}
