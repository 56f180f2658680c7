use std::sync::Arc;

use image::DynamicImage;

use crate::assets::AssetSource;
use crate::error::{EngineError, InputError};
use crate::frame::validate_nv21;
use crate::handle::{DetectorBinding, NativeHandle};
use crate::types::{FaceBox, Orientation};

/// Face detector backed by one native detector handle.
pub struct FaceDetector {
    handle: NativeHandle<dyn DetectorBinding>,
    loaded: bool,
}

impl FaceDetector {
    pub fn new(binding: Arc<dyn DetectorBinding>) -> Result<Self, EngineError> {
        let handle = NativeHandle::acquire(binding)?;
        Ok(Self {
            handle,
            loaded: false,
        })
    }

    /// Load detector weights. Must succeed before `detect` returns anything.
    pub fn load_model(&mut self, assets: &dyn AssetSource) -> Result<(), EngineError> {
        let status = self.handle.binding().load_model(self.handle.raw(), assets);
        if status != 0 {
            tracing::error!(status, "face detector model load failed");
            return Err(EngineError::ModelLoadFailed {
                component: self.handle.kind(),
                status,
            });
        }
        self.loaded = true;
        tracing::info!(handle = self.handle.raw(), "face detector model loaded");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Detect faces in an NV21 frame.
    ///
    /// The buffer must be exactly `width * height * 3 / 2` bytes; otherwise
    /// nothing is forwarded to native code. Before a successful model load
    /// this returns no faces.
    pub fn detect(
        &mut self,
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: Orientation,
    ) -> Result<Vec<FaceBox>, EngineError> {
        validate_nv21(yuv, width, height)?;
        if !self.loaded {
            tracing::warn!("detect called before a model was loaded");
            return Ok(Vec::new());
        }
        let faces = self
            .handle
            .binding()
            .detect_yuv(self.handle.raw(), yuv, width, height, orientation);
        Ok(faces.into_iter().map(FaceBox::normalized).collect())
    }

    /// Detect faces in a decoded image. Only RGBA8888 pixels are accepted.
    pub fn detect_image(&mut self, image: &DynamicImage) -> Result<Vec<FaceBox>, EngineError> {
        let DynamicImage::ImageRgba8(rgba) = image else {
            return Err(InputError::PixelFormat(format!("{:?}", image.color())).into());
        };
        if !self.loaded {
            tracing::warn!("detect called before a model was loaded");
            return Ok(Vec::new());
        }
        let faces = self.handle.binding().detect_rgba(
            self.handle.raw(),
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
        );
        Ok(faces.into_iter().map(FaceBox::normalized).collect())
    }

    /// Release the native detector.
    pub fn destroy(self) {
        tracing::info!(handle = self.handle.raw(), "destroying face detector");
    }
}
