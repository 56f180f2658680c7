use livebody_core::{FrameOutcome, ScreenMapping};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayStats {
    pub results: u64,
    pub live: u64,
    pub skipped: u64,
}

/// Drain worker outcomes until the dispatcher goes away.
///
/// Each detection is mapped into screen coordinates and written to `out` as
/// one JSON line. Skipped frames are only logged.
pub async fn consume<W: AsyncWrite + Unpin>(
    mut outcomes: mpsc::UnboundedReceiver<FrameOutcome>,
    mapping: ScreenMapping,
    mut out: W,
) -> DisplayStats {
    let mut stats = DisplayStats::default();
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            FrameOutcome::Detected(mut result) => {
                mapping.apply(&mut result);
                stats.results += 1;
                let live = result.is_live();
                if live {
                    stats.live += 1;
                }
                tracing::info!(
                    has_face = result.has_face,
                    confidence = result.confidence,
                    threshold = result.threshold,
                    time_ms = result.time_ms,
                    live,
                    "result"
                );
                let mut line = match serde_json::to_string(&result) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize result");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(e) = out.write_all(line.as_bytes()).await {
                    tracing::warn!(error = %e, "failed to write result");
                }
            }
            FrameOutcome::Skipped(error) => {
                stats.skipped += 1;
                tracing::warn!(error = %error, "frame skipped");
            }
        }
    }
    if let Err(e) = out.flush().await {
        tracing::warn!(error = %e, "failed to flush results");
    }
    stats
}
