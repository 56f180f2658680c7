//! Frame-to-screen coordinate mapping for result consumers.

use crate::types::DetectionResult;

/// Independent horizontal and vertical scale factors from preview pixels to
/// screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    pub factor_x: f32,
    pub factor_y: f32,
}

impl ScreenMapping {
    pub fn new(factor_x: f32, factor_y: f32) -> Self {
        Self { factor_x, factor_y }
    }

    /// Derive the factors from screen and preview sizes.
    ///
    /// With `swap_axes` the preview is taken as rotated by 90°, so the
    /// horizontal factor divides by the preview height and the vertical one
    /// by the preview width. Returns `None` for a zero-sized preview.
    pub fn for_preview(
        screen_width: u32,
        screen_height: u32,
        preview_width: u32,
        preview_height: u32,
        swap_axes: bool,
    ) -> Option<Self> {
        if preview_width == 0 || preview_height == 0 {
            return None;
        }
        let (across, down) = if swap_axes {
            (preview_height, preview_width)
        } else {
            (preview_width, preview_height)
        };
        Some(Self::new(
            screen_width as f32 / across as f32,
            screen_height as f32 / down as f32,
        ))
    }

    /// Scale a box, truncating toward zero.
    pub fn map_box(&self, left: i32, top: i32, right: i32, bottom: i32) -> (i32, i32, i32, i32) {
        (
            (left as f32 * self.factor_x) as i32,
            (top as f32 * self.factor_y) as i32,
            (right as f32 * self.factor_x) as i32,
            (bottom as f32 * self.factor_y) as i32,
        )
    }

    /// Rewrite a result's box in screen coordinates.
    pub fn apply(&self, result: &mut DetectionResult) {
        let (left, top, right, bottom) =
            self.map_box(result.left, result.top, result.right, result.bottom);
        result.update_location(left, top, right, bottom);
    }
}

impl Default for ScreenMapping {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}
