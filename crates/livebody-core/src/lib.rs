//! livebody-core: engine wrappers, frame pipeline and single-flight
//! dispatch around a native face detection and liveness engine.
//!
//! The inference itself lives behind the binding traits in [`handle`]:
//! [`ffi`] links the native engine (feature `native`), [`scripted`] replays
//! canned results for dry runs and tests.

pub mod assets;
pub mod detector;
pub mod display;
pub mod dispatch;
pub mod error;
#[cfg(feature = "native")]
pub mod ffi;
pub mod frame;
pub mod handle;
pub mod liveness;
pub mod model_config;
pub mod pipeline;
pub mod scripted;
pub mod threshold;
pub mod types;

pub use assets::{AssetSource, DirAssets, MemoryAssets};
pub use detector::FaceDetector;
pub use display::ScreenMapping;
pub use dispatch::{DispatchCounts, FrameDispatcher, FrameOutcome, Submission};
pub use error::{ConfigError, EngineError, InputError};
pub use frame::{nv21_len, Frame};
pub use handle::{init_engine, engine_available, DetectorBinding, EngineState, LivenessBinding};
pub use liveness::LivenessScorer;
pub use model_config::{parse_model_configs, ModelConfig, CONFIG_PATH};
pub use pipeline::DetectionPipeline;
pub use scripted::{Script, ScriptedEngine};
pub use threshold::{ThresholdCell, DEFAULT_THRESHOLD};
pub use types::{DetectionResult, FaceBox, Orientation};
