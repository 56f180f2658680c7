//! Single-flight frame dispatch.
//!
//! Frames arrive at preview rate, much faster than the pipeline runs. The
//! dispatcher admits a frame only when nothing is in flight and hands it to
//! one dedicated worker thread. A frame that arrives while the worker is busy
//! is dropped and returned to the caller. Nothing is ever queued, so a result
//! always belongs to a recent frame.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::EngineError;
use crate::frame::Frame;
use crate::pipeline::DetectionPipeline;
use crate::threshold::ThresholdCell;
use crate::types::DetectionResult;

/// What the worker published for one admitted frame.
#[derive(Debug)]
pub enum FrameOutcome {
    Detected(DetectionResult),
    /// The frame was rejected or the pipeline failed on it. Not fatal.
    Skipped(EngineError),
}

/// Result of offering a frame to the dispatcher.
#[derive(Debug)]
pub enum Submission {
    Accepted,
    /// A frame is already in flight; the offered frame is handed back.
    Busy(Frame),
    /// The dispatcher no longer takes frames.
    Closed(Frame),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted)
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub accepted: u64,
    pub dropped: u64,
    pub detected: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct DispatchStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
    detected: AtomicU64,
    skipped: AtomicU64,
}

impl DispatchStats {
    fn snapshot(&self) -> DispatchCounts {
        DispatchCounts {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            detected: self.detected.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Clears the busy flag when the frame is done, even if the pipeline panics.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Producer-side handle of the single-flight loop.
pub struct FrameDispatcher {
    tx: Option<mpsc::Sender<Frame>>,
    busy: Arc<AtomicBool>,
    closed: AtomicBool,
    threshold: ThresholdCell,
    stats: Arc<DispatchStats>,
    worker: Option<JoinHandle<DetectionPipeline>>,
}

impl FrameDispatcher {
    /// Move `pipeline` onto a dedicated worker thread.
    ///
    /// Returns the dispatcher and the receiver of per-frame outcomes. Each
    /// published result carries the threshold current at publish time.
    pub fn spawn(
        pipeline: DetectionPipeline,
        threshold: ThresholdCell,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FrameOutcome>), EngineError> {
        let (tx, rx) = mpsc::channel::<Frame>(1);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let busy = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(DispatchStats::default());

        let worker = {
            let busy = busy.clone();
            let stats = stats.clone();
            let threshold = threshold.clone();
            std::thread::Builder::new()
                .name("livebody-detect".into())
                .spawn(move || run_worker(pipeline, rx, busy, threshold, stats, outcome_tx))
                .map_err(EngineError::Spawn)?
        };

        Ok((
            Self {
                tx: Some(tx),
                busy,
                closed: AtomicBool::new(false),
                threshold,
                stats,
                worker: Some(worker),
            },
            outcome_rx,
        ))
    }

    /// Offer a frame. Never blocks.
    pub fn submit(&self, frame: Frame) -> Submission {
        if self.closed.load(Ordering::Acquire) {
            return Submission::Closed(frame);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return Submission::Busy(frame);
        }

        let Some(tx) = self.tx.as_ref() else {
            self.busy.store(false, Ordering::Release);
            return Submission::Closed(frame);
        };
        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Submission::Accepted
            }
            // Busy is held from send until the worker has emptied the slot,
            // so this only happens if that invariant is broken.
            Err(TrySendError::Full(frame)) => {
                self.busy.store(false, Ordering::Release);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Submission::Busy(frame)
            }
            Err(TrySendError::Closed(frame)) => {
                self.busy.store(false, Ordering::Release);
                tracing::warn!("dispatch worker is gone; frame rejected");
                Submission::Closed(frame)
            }
        }
    }

    pub fn threshold(&self) -> &ThresholdCell {
        &self.threshold
    }

    pub fn counts(&self) -> DispatchCounts {
        self.stats.snapshot()
    }

    /// Stop admitting frames. The in-flight frame, if any, still completes.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("frame dispatch closed");
        }
    }

    /// Close, wait for the in-flight frame, and hand the pipeline back so the
    /// caller can destroy it. `None` if the worker thread died.
    pub fn shutdown(mut self) -> Option<DetectionPipeline> {
        self.stop()
    }

    fn stop(&mut self) -> Option<DetectionPipeline> {
        self.close();
        drop(self.tx.take());
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(pipeline) => {
                let counts = self.stats.snapshot();
                tracing::info!(
                    accepted = counts.accepted,
                    dropped = counts.dropped,
                    detected = counts.detected,
                    skipped = counts.skipped,
                    "frame dispatch stopped"
                );
                Some(pipeline)
            }
            Err(_) => {
                tracing::error!("dispatch worker panicked");
                None
            }
        }
    }
}

impl Drop for FrameDispatcher {
    fn drop(&mut self) {
        if let Some(pipeline) = self.stop() {
            pipeline.destroy();
        }
    }
}

fn run_worker(
    mut pipeline: DetectionPipeline,
    mut rx: mpsc::Receiver<Frame>,
    busy: Arc<AtomicBool>,
    threshold: ThresholdCell,
    stats: Arc<DispatchStats>,
    outcomes: mpsc::UnboundedSender<FrameOutcome>,
) -> DetectionPipeline {
    tracing::info!("dispatch worker started");
    while let Some(frame) = rx.blocking_recv() {
        let outcome = {
            let _busy = BusyGuard(&busy);
            run_frame(&mut pipeline, &frame, &threshold)
        };
        match &outcome {
            FrameOutcome::Detected(_) => stats.detected.fetch_add(1, Ordering::Relaxed),
            FrameOutcome::Skipped(_) => stats.skipped.fetch_add(1, Ordering::Relaxed),
        };
        if outcomes.send(outcome).is_err() {
            tracing::trace!("outcome receiver dropped");
        }
    }
    tracing::info!("dispatch worker exiting");
    pipeline
}

fn run_frame(pipeline: &mut DetectionPipeline, frame: &Frame, threshold: &ThresholdCell) -> FrameOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| pipeline.process_frame(frame))) {
        Ok(Ok(result)) => {
            let result = result.with_threshold(threshold.get());
            tracing::debug!(
                has_face = result.has_face,
                confidence = result.confidence,
                threshold = result.threshold,
                time_ms = result.time_ms,
                "frame processed"
            );
            FrameOutcome::Detected(result)
        }
        Ok(Err(error)) => {
            tracing::debug!(error = %error, "frame skipped");
            FrameOutcome::Skipped(error)
        }
        Err(_) => {
            tracing::error!("pipeline panicked; frame skipped");
            FrameOutcome::Skipped(EngineError::WorkerPanic)
        }
    }
}
