use thiserror::Error;

/// Errors surfaced by the engine components, the pipeline and the dispatcher.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("native engine unavailable")]
    EngineUnavailable,
    #[error("{component}: native allocation returned an invalid handle")]
    AllocationFailed { component: &'static str },
    #[error("{component}: model load failed with status {status}")]
    ModelLoadFailed { component: &'static str, status: i32 },
    #[error("liveness model config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("pipeline panicked while processing a frame")]
    WorkerPanic,
    #[error("failed to spawn dispatch worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl EngineError {
    /// True for failures confined to a single frame. Everything else is a
    /// startup failure that leaves the pipeline disabled.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, EngineError::InvalidInput(_) | EngineError::WorkerPanic)
    }
}

/// Malformed frame data handed to a detector or scorer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("expected {expected} bytes for a {width}x{height} NV21 frame, got {actual}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("{width}x{height} frame is too large to address")]
    Dimensions { width: u32, height: u32 },
    #[error("unsupported pixel format {0} (expected RGBA8888)")]
    PixelFormat(String),
}

/// Failure to read or parse `live/config.json`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model config array: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("model config array is empty")]
    NoModels,
    #[error("model config '{name}' has invalid input size {width}x{height}")]
    InvalidGeometry {
        name: String,
        width: u32,
        height: u32,
    },
}
