use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Default liveness decision threshold shown alongside results.
pub const DEFAULT_THRESHOLD: f32 = 0.915;

/// Shared threshold that the settings layer may change while frames run.
///
/// The value is stored as raw `f32` bits so readers never block.
#[derive(Debug, Clone)]
pub struct ThresholdCell(Arc<AtomicU32>);

impl ThresholdCell {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Store a new threshold. Non-finite values are ignored.
    pub fn set(&self, value: f32) -> bool {
        if !value.is_finite() {
            tracing::warn!(value, "ignoring non-finite threshold");
            return false;
        }
        self.0.store(value.to_bits(), Ordering::Relaxed);
        tracing::info!(threshold = value, "threshold updated");
        true
    }
}

impl Default for ThresholdCell {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
