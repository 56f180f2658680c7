//! Raw NV21 frame source.
//!
//! Replays a file of back-to-back NV21 frames into the dispatcher at a fixed
//! rate, the way a camera preview callback would. A trailing partial frame
//! is ignored.

use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use livebody_core::{nv21_len, Frame, FrameDispatcher, Orientation, Submission};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{interval, MissedTickBehavior};

/// Where and how to read preview frames.
#[derive(Debug, Clone)]
pub struct FrameSource {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub fps: u32,
    pub looping: bool,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: u64,
    pub accepted: u64,
    pub busy: u64,
}

impl FrameSource {
    /// Feed frames until end of file (unless looping) or until the dispatcher
    /// closes.
    pub async fn replay(&self, dispatcher: Arc<FrameDispatcher>) -> Result<ReplayStats> {
        let frame_len = match nv21_len(self.width, self.height) {
            Some(0) | None => bail!("frame size {}x{} is unusable", self.width, self.height),
            Some(len) => len,
        };
        let mut file = File::open(&self.path)
            .await
            .with_context(|| format!("failed to open frame file {}", self.path.display()))?;

        let mut ticker = interval(Duration::from_secs(1) / self.fps.max(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            path = %self.path.display(),
            width = self.width,
            height = self.height,
            fps = self.fps,
            "replaying frames"
        );

        let mut stats = ReplayStats::default();
        let mut read_this_pass = 0u64;
        loop {
            let mut data = vec![0u8; frame_len];
            match file.read_exact(&mut data).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    if !self.looping {
                        break;
                    }
                    if read_this_pass == 0 {
                        tracing::warn!("frame file holds no complete frame; stopping");
                        break;
                    }
                    file.seek(SeekFrom::Start(0)).await?;
                    read_this_pass = 0;
                    continue;
                }
                Err(e) => return Err(e).context("failed to read frame file"),
            }
            read_this_pass += 1;

            ticker.tick().await;
            stats.frames += 1;
            match dispatcher.submit(Frame::new(data, self.width, self.height, self.orientation)) {
                Submission::Accepted => stats.accepted += 1,
                Submission::Busy(_) => stats.busy += 1,
                Submission::Closed(_) => {
                    tracing::debug!("dispatcher closed; frame source stopping");
                    break;
                }
            }
        }

        tracing::info!(
            frames = stats.frames,
            accepted = stats.accepted,
            busy = stats.busy,
            "frame source finished"
        );
        Ok(stats)
    }
}
