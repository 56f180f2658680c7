//! C ABI bindings to the native `libengine`.
//!
//! Model weights are read through the [`AssetSource`] on the Rust side and
//! handed to the engine as byte slices:
//!
//! - detector: `detection/detection.param` + `detection/detection.bin`
//! - liveness: `live/<name>.param` + `live/<name>.bin` per sub-model
//!
//! Call [`probe`] through [`crate::handle::init_engine`] once at startup;
//! both bindings report themselves unavailable until it has succeeded.

use std::collections::HashSet;
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard};

use libc::{c_char, c_int};

use crate::assets::AssetSource;
use crate::frame::validate_nv21;
use crate::handle::{engine_available, Component, DetectorBinding, LivenessBinding, RawHandle};
use crate::model_config::ModelConfig;
use crate::types::{FaceBox, Orientation};

/// Largest number of faces collected from one detector call.
pub const MAX_FACES: usize = 32;

/// Status returned when a model asset cannot be read.
pub const STATUS_ASSET_UNREADABLE: i32 = -100;
/// Status returned when a config cannot be passed across the boundary.
pub const STATUS_BAD_CONFIG: i32 = -101;
/// Status returned for a handle this binding did not allocate.
pub const STATUS_BAD_HANDLE: i32 = -102;

pub const DETECTOR_PARAM: &str = "detection/detection.param";
pub const DETECTOR_WEIGHTS: &str = "detection/detection.bin";

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct RawFaceBox {
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

#[repr(C)]
struct RawModelConfig {
    scale: f32,
    shift_x: f32,
    shift_y: f32,
    height: c_int,
    width: c_int,
    name: *const c_char,
    org_resize: bool,
    param: *const u8,
    param_len: usize,
    weights: *const u8,
    weights_len: usize,
}

#[link(name = "engine")]
extern "C" {
    fn mv_engine_init() -> c_int;

    fn mv_detector_allocate() -> u64;
    fn mv_detector_deallocate(handle: u64);
    fn mv_detector_load_model(
        handle: u64,
        param: *const u8,
        param_len: usize,
        weights: *const u8,
        weights_len: usize,
    ) -> c_int;
    fn mv_detector_detect_yuv(
        handle: u64,
        yuv: *const u8,
        width: c_int,
        height: c_int,
        orientation: c_int,
        out: *mut RawFaceBox,
        capacity: usize,
    ) -> c_int;
    fn mv_detector_detect_rgba(
        handle: u64,
        rgba: *const u8,
        width: c_int,
        height: c_int,
        out: *mut RawFaceBox,
        capacity: usize,
    ) -> c_int;

    fn mv_live_allocate() -> u64;
    fn mv_live_deallocate(handle: u64);
    fn mv_live_load_model(handle: u64, configs: *const RawModelConfig, count: usize) -> c_int;
    fn mv_live_detect_yuv(
        handle: u64,
        yuv: *const u8,
        width: c_int,
        height: c_int,
        orientation: c_int,
        left: c_int,
        top: c_int,
        right: c_int,
        bottom: c_int,
    ) -> f32;
}

/// Initialise the engine runtime. Pass to [`crate::handle::init_engine`].
pub fn probe() -> Result<(), String> {
    // SAFETY: takes no arguments and touches no Rust-owned memory.
    let status = unsafe { mv_engine_init() };
    if status == 0 {
        Ok(())
    } else {
        Err(format!("mv_engine_init returned {status}"))
    }
}

fn dims(width: u32, height: u32) -> Option<(c_int, c_int)> {
    Some((c_int::try_from(width).ok()?, c_int::try_from(height).ok()?))
}

fn collect_faces(out: &[RawFaceBox], count: c_int) -> Vec<FaceBox> {
    let count = usize::try_from(count).unwrap_or(0).min(out.len());
    out[..count]
        .iter()
        .map(|b| FaceBox::new(b.x1 as i32, b.y1 as i32, b.x2 as i32, b.y2 as i32, b.confidence))
        .collect()
}

/// Handles allocated through one binding and not yet released.
///
/// Native calls are only made for handles in the set, and the set stays
/// locked for the duration of the call, so a safe caller can never pass a
/// released or foreign handle across the boundary.
#[derive(Default)]
struct LiveHandles(Mutex<HashSet<RawHandle>>);

impl LiveHandles {
    fn lock(&self) -> MutexGuard<'_, HashSet<RawHandle>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn unknown_handle(kind: &'static str, handle: RawHandle) {
    tracing::warn!(component = kind, handle, "ignoring call with an unknown native handle");
}

fn read_asset(assets: &dyn AssetSource, path: &str) -> Option<Vec<u8>> {
    match assets.read(path) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::error!(path, error = %e, "failed to read model asset");
            None
        }
    }
}

/// Face detector implemented by `libengine`.
#[derive(Default)]
pub struct NativeDetector {
    live: LiveHandles,
}

impl Component for NativeDetector {
    fn kind(&self) -> &'static str {
        "face-detector"
    }

    fn available(&self) -> bool {
        engine_available()
    }

    fn allocate(&self) -> RawHandle {
        let mut live = self.live.lock();
        // SAFETY: returns a fresh handle or 0; no arguments.
        let handle = unsafe { mv_detector_allocate() };
        if handle != 0 {
            live.insert(handle);
        }
        handle
    }

    fn deallocate(&self, handle: RawHandle) {
        let mut live = self.live.lock();
        if !live.remove(&handle) {
            return unknown_handle(self.kind(), handle);
        }
        // SAFETY: `handle` was in the live set, so it came from
        // mv_detector_allocate and has not been released yet.
        unsafe { mv_detector_deallocate(handle) }
    }
}

impl DetectorBinding for NativeDetector {
    fn load_model(&self, handle: RawHandle, assets: &dyn AssetSource) -> i32 {
        let live = self.live.lock();
        if !live.contains(&handle) {
            unknown_handle(self.kind(), handle);
            return STATUS_BAD_HANDLE;
        }
        let (Some(param), Some(weights)) = (
            read_asset(assets, DETECTOR_PARAM),
            read_asset(assets, DETECTOR_WEIGHTS),
        ) else {
            return STATUS_ASSET_UNREADABLE;
        };
        // SAFETY: `handle` is live; both buffers outlive the call and the
        // lengths match the pointers.
        unsafe {
            mv_detector_load_model(
                handle,
                param.as_ptr(),
                param.len(),
                weights.as_ptr(),
                weights.len(),
            )
        }
    }

    fn detect_yuv(
        &self,
        handle: RawHandle,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
    ) -> Vec<FaceBox> {
        let live = self.live.lock();
        if !live.contains(&handle) {
            unknown_handle(self.kind(), handle);
            return Vec::new();
        }
        let Some((w, h)) = dims(width, height) else {
            return Vec::new();
        };
        if let Err(e) = validate_nv21(yuv, width, height) {
            tracing::warn!(error = %e, "refusing frame for native detector");
            return Vec::new();
        }
        let mut out = [RawFaceBox::default(); MAX_FACES];
        // SAFETY: `handle` is live, `yuv` holds exactly w*h*3/2 bytes and
        // `out` has room for MAX_FACES boxes.
        let count = unsafe {
            mv_detector_detect_yuv(
                handle,
                yuv.as_ptr(),
                w,
                h,
                orientation.code(),
                out.as_mut_ptr(),
                out.len(),
            )
        };
        collect_faces(&out, count)
    }

    fn detect_rgba(&self, handle: RawHandle, rgba: &[u8], width: u32, height: u32) -> Vec<FaceBox> {
        let live = self.live.lock();
        if !live.contains(&handle) {
            unknown_handle(self.kind(), handle);
            return Vec::new();
        }
        let Some((w, h)) = dims(width, height) else {
            return Vec::new();
        };
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if expected != Some(rgba.len()) {
            return Vec::new();
        }
        let mut out = [RawFaceBox::default(); MAX_FACES];
        // SAFETY: `handle` is live, `rgba` holds w*h*4 bytes and `out` has
        // room for MAX_FACES boxes.
        let count = unsafe {
            mv_detector_detect_rgba(handle, rgba.as_ptr(), w, h, out.as_mut_ptr(), out.len())
        };
        collect_faces(&out, count)
    }
}

/// Liveness scorer implemented by `libengine`.
#[derive(Default)]
pub struct NativeLiveness {
    live: LiveHandles,
}

impl Component for NativeLiveness {
    fn kind(&self) -> &'static str {
        "liveness"
    }

    fn available(&self) -> bool {
        engine_available()
    }

    fn allocate(&self) -> RawHandle {
        let mut live = self.live.lock();
        // SAFETY: returns a fresh handle or 0; no arguments.
        let handle = unsafe { mv_live_allocate() };
        if handle != 0 {
            live.insert(handle);
        }
        handle
    }

    fn deallocate(&self, handle: RawHandle) {
        let mut live = self.live.lock();
        if !live.remove(&handle) {
            return unknown_handle(self.kind(), handle);
        }
        // SAFETY: `handle` was in the live set, so it came from
        // mv_live_allocate and has not been released yet.
        unsafe { mv_live_deallocate(handle) }
    }
}

impl LivenessBinding for NativeLiveness {
    fn load_model(
        &self,
        handle: RawHandle,
        assets: &dyn AssetSource,
        configs: &[ModelConfig],
    ) -> i32 {
        let live = self.live.lock();
        if !live.contains(&handle) {
            unknown_handle(self.kind(), handle);
            return STATUS_BAD_HANDLE;
        }
        if configs.is_empty() {
            return STATUS_BAD_CONFIG;
        }
        let mut names = Vec::with_capacity(configs.len());
        let mut blobs = Vec::with_capacity(configs.len());
        for config in configs {
            let Ok(name) = CString::new(config.name.as_str()) else {
                tracing::error!(name = %config.name, "model name contains a NUL byte");
                return STATUS_BAD_CONFIG;
            };
            let (Ok(width), Ok(height)) = (c_int::try_from(config.width), c_int::try_from(config.height))
            else {
                return STATUS_BAD_CONFIG;
            };
            let (Some(param), Some(weights)) = (
                read_asset(assets, &format!("live/{}.param", config.name)),
                read_asset(assets, &format!("live/{}.bin", config.name)),
            ) else {
                return STATUS_ASSET_UNREADABLE;
            };
            names.push((name, width, height));
            blobs.push((param, weights));
        }

        let raw: Vec<RawModelConfig> = configs
            .iter()
            .zip(&names)
            .zip(&blobs)
            .map(|((config, (name, width, height)), (param, weights))| RawModelConfig {
                scale: config.scale,
                shift_x: config.shift_x,
                shift_y: config.shift_y,
                height: *height,
                width: *width,
                name: name.as_ptr(),
                org_resize: config.org_resize,
                param: param.as_ptr(),
                param_len: param.len(),
                weights: weights.as_ptr(),
                weights_len: weights.len(),
            })
            .collect();

        // SAFETY: `handle` is live; every pointer in `raw` borrows from
        // `names` / `blobs`, which live until after the call.
        unsafe { mv_live_load_model(handle, raw.as_ptr(), raw.len()) }
    }

    fn detect_yuv(
        &self,
        handle: RawHandle,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
        face: &FaceBox,
    ) -> f32 {
        let live = self.live.lock();
        if !live.contains(&handle) {
            unknown_handle(self.kind(), handle);
            return 0.0;
        }
        let Some((w, h)) = dims(width, height) else {
            return 0.0;
        };
        if let Err(e) = validate_nv21(yuv, width, height) {
            tracing::warn!(error = %e, "refusing frame for native liveness");
            return 0.0;
        }
        // SAFETY: `handle` is live and `yuv` holds exactly w*h*3/2 bytes.
        unsafe {
            mv_live_detect_yuv(
                handle,
                yuv.as_ptr(),
                w,
                h,
                orientation.code(),
                face.left,
                face.top,
                face.right,
                face.bottom,
            )
        }
    }
}
