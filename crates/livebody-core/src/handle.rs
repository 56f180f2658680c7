//! Native handle ownership and the binding surface of the engine.
//!
//! Every stateful engine component owns exactly one [`NativeHandle`]. The
//! handle is acquired on construction and released exactly once, either via
//! the component's `destroy` or when it is dropped. It cannot be cloned, so
//! nothing can reach a released handle.

use std::num::NonZeroU64;
use std::sync::{Arc, OnceLock};

use crate::assets::AssetSource;
use crate::error::EngineError;
use crate::model_config::ModelConfig;
use crate::types::{FaceBox, Orientation};

/// Raw identifier of native-side state. Zero is never a valid handle.
pub type RawHandle = u64;

/// Lifecycle shared by every native engine component.
pub trait Component: Send + Sync {
    /// Short component name used in logs and errors.
    fn kind(&self) -> &'static str;
    /// Whether the native library backing this component is usable.
    fn available(&self) -> bool;
    /// Create native state. Returns 0 on failure.
    fn allocate(&self) -> RawHandle;
    fn deallocate(&self, handle: RawHandle);
}

/// Native face detector entry points.
pub trait DetectorBinding: Component {
    /// Load detector weights. 0 means success.
    fn load_model(&self, handle: RawHandle, assets: &dyn AssetSource) -> i32;
    fn detect_yuv(
        &self,
        handle: RawHandle,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
    ) -> Vec<FaceBox>;
    /// Detect on tightly packed RGBA8888 pixels.
    fn detect_rgba(&self, handle: RawHandle, rgba: &[u8], width: u32, height: u32) -> Vec<FaceBox>;
}

/// Native liveness scorer entry points.
pub trait LivenessBinding: Component {
    /// Load every sub-model named in `configs`. 0 means success.
    fn load_model(
        &self,
        handle: RawHandle,
        assets: &dyn AssetSource,
        configs: &[ModelConfig],
    ) -> i32;
    fn detect_yuv(
        &self,
        handle: RawHandle,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
        face: &FaceBox,
    ) -> f32;
}

/// Exclusively owned native handle, released exactly once on drop.
pub struct NativeHandle<B: Component + ?Sized> {
    raw: NonZeroU64,
    binding: Arc<B>,
}

impl<B: Component + ?Sized> NativeHandle<B> {
    /// Allocate native state through `binding`.
    ///
    /// Fails fast when the engine is unavailable or the allocation yields
    /// the invalid handle.
    pub fn acquire(binding: Arc<B>) -> Result<Self, EngineError> {
        if !binding.available() {
            tracing::error!(component = binding.kind(), "native engine unavailable");
            return Err(EngineError::EngineUnavailable);
        }
        let raw = NonZeroU64::new(binding.allocate()).ok_or(EngineError::AllocationFailed {
            component: binding.kind(),
        })?;
        tracing::debug!(component = binding.kind(), handle = raw.get(), "native handle allocated");
        Ok(Self { raw, binding })
    }

    pub fn raw(&self) -> RawHandle {
        self.raw.get()
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn kind(&self) -> &'static str {
        self.binding.kind()
    }
}

impl<B: Component + ?Sized> Drop for NativeHandle<B> {
    fn drop(&mut self) {
        self.binding.deallocate(self.raw.get());
        tracing::debug!(
            component = self.binding.kind(),
            handle = self.raw.get(),
            "native handle released"
        );
    }
}

/// Process-wide state of the native library, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Available,
    Unavailable(String),
}

static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Probe the native library once. Later calls return the first outcome
/// without probing again.
pub fn init_engine<F>(probe: F) -> &'static EngineState
where
    F: FnOnce() -> Result<(), String>,
{
    ENGINE_STATE.get_or_init(|| match probe() {
        Ok(()) => {
            tracing::info!("native engine initialised");
            EngineState::Available
        }
        Err(reason) => {
            tracing::error!(%reason, "native engine failed to initialise");
            EngineState::Unavailable(reason)
        }
    })
}

/// Whether [`init_engine`] ran and succeeded.
pub fn engine_available() -> bool {
    matches!(ENGINE_STATE.get(), Some(EngineState::Available))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct Counting {
        available: bool,
        next: AtomicU64,
        released: AtomicUsize,
    }

    impl Counting {
        fn new(available: bool, first: u64) -> Arc<Self> {
            Arc::new(Self {
                available,
                next: AtomicU64::new(first),
                released: AtomicUsize::new(0),
            })
        }
    }

    impl Component for Counting {
        fn kind(&self) -> &'static str {
            "counting"
        }
        fn available(&self) -> bool {
            self.available
        }
        fn allocate(&self) -> RawHandle {
            self.next.fetch_add(1, Ordering::SeqCst)
        }
        fn deallocate(&self, _handle: RawHandle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn handle_is_released_exactly_once() {
        let binding = Counting::new(true, 7);
        let handle = NativeHandle::acquire(binding.clone()).unwrap();
        assert_eq!(handle.raw(), 7);
        drop(handle);
        assert_eq!(binding.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_engine_fails_fast() {
        let binding = Counting::new(false, 1);
        let err = NativeHandle::acquire(binding.clone()).err().unwrap();
        assert!(matches!(err, EngineError::EngineUnavailable));
        assert_eq!(binding.next.load(Ordering::SeqCst), 1, "allocate must not run");
    }

    #[test]
    fn zero_handle_fails_construction() {
        let binding = Counting::new(true, 0);
        let err = NativeHandle::acquire(binding.clone()).err().unwrap();
        assert!(matches!(err, EngineError::AllocationFailed { component: "counting" }));
        assert_eq!(binding.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn engine_state_is_decided_once() {
        let first = init_engine(|| Err("libengine.so not found".to_string()));
        assert_eq!(first, &EngineState::Unavailable("libengine.so not found".into()));
        let second = init_engine(|| Ok(()));
        assert_eq!(second, first);
        assert!(!engine_available());
    }
}
