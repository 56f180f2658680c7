//! Deterministic in-process engine that replays faces and scores from a script.
//!
//! Used for dry runs without the native library and as the engine in tests.
//! Every entry point counts its calls so callers can check which native
//! calls happened.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use crate::assets::AssetSource;
use crate::handle::{Component, DetectorBinding, LivenessBinding, RawHandle};
use crate::model_config::ModelConfig;
use crate::types::{FaceBox, Orientation};

/// What the engine reports for one frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptedFrame {
    #[serde(default)]
    pub faces: Vec<FaceBox>,
    /// Liveness score returned when a face of this frame is scored.
    #[serde(default)]
    pub score: f32,
}

/// Engine behaviour. Frames are replayed in order and wrap around.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub frames: Vec<ScriptedFrame>,
    #[serde(default)]
    pub detect_delay_ms: u64,
    #[serde(default)]
    pub score_delay_ms: u64,
    #[serde(default)]
    pub detector_load_status: i32,
    #[serde(default)]
    pub liveness_load_status: i32,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Default for Script {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            detect_delay_ms: 0,
            score_delay_ms: 0,
            detector_load_status: 0,
            liveness_load_status: 0,
            available: true,
        }
    }
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Snapshot of the call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub allocations: usize,
    pub deallocations: usize,
    pub detector_loads: usize,
    pub liveness_loads: usize,
    pub detector_calls: usize,
    pub liveness_calls: usize,
    /// Highest number of detect/score calls observed running at once.
    pub max_in_flight: usize,
}

#[derive(Default)]
struct Counters {
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    detector_loads: AtomicUsize,
    liveness_loads: AtomicUsize,
    detector_calls: AtomicUsize,
    liveness_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct State {
    script: Script,
    next_handle: AtomicU64,
    current_frame: AtomicUsize,
    counters: Counters,
    loaded_configs: Mutex<Vec<ModelConfig>>,
    scored_faces: Mutex<Vec<FaceBox>>,
}

impl State {
    fn enter(&self) -> InFlight<'_> {
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.counters.in_flight)
    }

    fn allocate(&self) -> RawHandle {
        self.counters.allocations.fetch_add(1, Ordering::SeqCst);
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn deallocate(&self) {
        self.counters.deallocations.fetch_add(1, Ordering::SeqCst);
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Shared script state; hands out detector and liveness bindings.
#[derive(Clone)]
pub struct ScriptedEngine {
    state: Arc<State>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            state: Arc::new(State {
                script,
                next_handle: AtomicU64::new(1),
                current_frame: AtomicUsize::new(0),
                counters: Counters::default(),
                loaded_configs: Mutex::new(Vec::new()),
                scored_faces: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn detector(&self) -> Arc<ScriptedDetector> {
        Arc::new(ScriptedDetector {
            state: self.state.clone(),
        })
    }

    pub fn liveness(&self) -> Arc<ScriptedLiveness> {
        Arc::new(ScriptedLiveness {
            state: self.state.clone(),
        })
    }

    pub fn counts(&self) -> CallCounts {
        let c = &self.state.counters;
        CallCounts {
            allocations: c.allocations.load(Ordering::SeqCst),
            deallocations: c.deallocations.load(Ordering::SeqCst),
            detector_loads: c.detector_loads.load(Ordering::SeqCst),
            liveness_loads: c.liveness_loads.load(Ordering::SeqCst),
            detector_calls: c.detector_calls.load(Ordering::SeqCst),
            liveness_calls: c.liveness_calls.load(Ordering::SeqCst),
            max_in_flight: c.max_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Config list passed to the last liveness load.
    pub fn loaded_configs(&self) -> Vec<ModelConfig> {
        self.state
            .loaded_configs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every face box handed to the scorer, in call order.
    pub fn scored_faces(&self) -> Vec<FaceBox> {
        self.state
            .scored_faces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

pub struct ScriptedDetector {
    state: Arc<State>,
}

impl ScriptedDetector {
    fn next_faces(&self) -> Vec<FaceBox> {
        let s = &self.state;
        let call = s.counters.detector_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = s.enter();
        pause(s.script.detect_delay_ms);
        if s.script.frames.is_empty() {
            return Vec::new();
        }
        let idx = call % s.script.frames.len();
        s.current_frame.store(idx, Ordering::SeqCst);
        s.script.frames[idx].faces.clone()
    }
}

impl Component for ScriptedDetector {
    fn kind(&self) -> &'static str {
        "face-detector"
    }

    fn available(&self) -> bool {
        self.state.script.available
    }

    fn allocate(&self) -> RawHandle {
        self.state.allocate()
    }

    fn deallocate(&self, _handle: RawHandle) {
        self.state.deallocate();
    }
}

impl DetectorBinding for ScriptedDetector {
    fn load_model(&self, _handle: RawHandle, _assets: &dyn AssetSource) -> i32 {
        self.state
            .counters
            .detector_loads
            .fetch_add(1, Ordering::SeqCst);
        self.state.script.detector_load_status
    }

    fn detect_yuv(
        &self,
        _handle: RawHandle,
        _yuv: &[u8],
        _width: u32,
        _height: u32,
        _orientation: Orientation,
    ) -> Vec<FaceBox> {
        self.next_faces()
    }

    fn detect_rgba(&self, _handle: RawHandle, _rgba: &[u8], _width: u32, _height: u32) -> Vec<FaceBox> {
        self.next_faces()
    }
}

pub struct ScriptedLiveness {
    state: Arc<State>,
}

impl Component for ScriptedLiveness {
    fn kind(&self) -> &'static str {
        "liveness"
    }

    fn available(&self) -> bool {
        self.state.script.available
    }

    fn allocate(&self) -> RawHandle {
        self.state.allocate()
    }

    fn deallocate(&self, _handle: RawHandle) {
        self.state.deallocate();
    }
}

impl LivenessBinding for ScriptedLiveness {
    fn load_model(
        &self,
        _handle: RawHandle,
        _assets: &dyn AssetSource,
        configs: &[ModelConfig],
    ) -> i32 {
        let s = &self.state;
        s.counters.liveness_loads.fetch_add(1, Ordering::SeqCst);
        *s.loaded_configs.lock().unwrap_or_else(|e| e.into_inner()) = configs.to_vec();
        s.script.liveness_load_status
    }

    fn detect_yuv(
        &self,
        _handle: RawHandle,
        _yuv: &[u8],
        _width: u32,
        _height: u32,
        _orientation: Orientation,
        face: &FaceBox,
    ) -> f32 {
        let s = &self.state;
        s.counters.liveness_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = s.enter();
        pause(s.script.score_delay_ms);
        s.scored_faces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*face);
        s.script
            .frames
            .get(s.current_frame.load(Ordering::SeqCst))
            .map_or(0.0, |f| f.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_parses_with_defaults() {
        let script = Script::from_json(
            r#"{"frames":[{"faces":[{"left":1,"top":2,"right":3,"bottom":4,"confidence":0.5}],"score":0.9},{}]}"#,
        )
        .unwrap();
        assert_eq!(script.frames.len(), 2);
        assert!(script.frames[1].faces.is_empty());
        assert!(script.available);
        assert_eq!(script.detect_delay_ms, 0);
    }

    #[test]
    fn frames_wrap_around() {
        let engine = ScriptedEngine::new(Script {
            frames: vec![
                ScriptedFrame {
                    faces: vec![FaceBox::new(0, 0, 1, 1, 1.0)],
                    score: 0.1,
                },
                ScriptedFrame::default(),
            ],
            ..Script::default()
        });
        let det = engine.detector();
        let live = engine.liveness();
        let face = FaceBox::default();

        assert_eq!(det.detect_yuv(1, &[], 0, 0, Orientation::NONE).len(), 1);
        assert_eq!(live.detect_yuv(2, &[], 0, 0, Orientation::NONE, &face), 0.1);
        assert!(det.detect_yuv(1, &[], 0, 0, Orientation::NONE).is_empty());
        assert_eq!(det.detect_yuv(1, &[], 0, 0, Orientation::NONE).len(), 1);
        assert_eq!(engine.counts().detector_calls, 3);
    }

    #[test]
    fn handles_are_unique_and_nonzero() {
        let engine = ScriptedEngine::new(Script::default());
        let a = engine.detector().allocate();
        let b = engine.liveness().allocate();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }
}
