use serde::{Deserialize, Serialize};

/// A face located by the detector, in frame pixel coordinates.
///
/// `confidence` holds the raw detection score until the pipeline overwrites
/// it with the liveness score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub confidence: f32,
}

impl FaceBox {
    /// Build a box, reordering the corners so that `left <= right` and
    /// `top <= bottom` always hold.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32, confidence: f32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
            confidence,
        }
    }

    /// Re-establish the corner ordering on a box that came from outside.
    pub fn normalized(self) -> Self {
        Self::new(self.left, self.top, self.right, self.bottom, self.confidence)
    }
}

/// Rotation/mirroring code forwarded untouched to the native converter.
///
/// The named constants are the EXIF-style codes the engine understands;
/// any other value is passed through and treated as "no transform" natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orientation(pub i32);

impl Orientation {
    pub const NONE: Self = Self(1);
    pub const FLIP_HORIZONTAL: Self = Self(2);
    pub const ROTATE_180: Self = Self(3);
    pub const FLIP_VERTICAL: Self = Self(4);
    pub const TRANSPOSE: Self = Self(5);
    pub const ROTATE_90_CW: Self = Self(6);
    pub const TRANSVERSE: Self = Self(7);
    pub const ROTATE_90_CCW: Self = Self(8);

    pub fn code(self) -> i32 {
        self.0
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<i32> for Orientation {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Outcome of one pipeline pass, handed to the display layer.
///
/// A default value (`has_face == false`, all fields zero) means no face was
/// found in the frame. That is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DetectionResult {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    /// Final liveness score of the scored face.
    pub confidence: f32,
    /// Milliseconds spent in the liveness stage only.
    pub time_ms: u64,
    /// Decision threshold supplied by the caller, carried for display.
    pub threshold: f32,
    pub has_face: bool,
}

impl DetectionResult {
    pub fn from_face(face: &FaceBox, time_ms: u64) -> Self {
        Self {
            left: face.left,
            top: face.top,
            right: face.right,
            bottom: face.bottom,
            confidence: face.confidence,
            time_ms,
            threshold: 0.0,
            has_face: true,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replace the box with display coordinates.
    pub fn update_location(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        self.left = left;
        self.top = top;
        self.right = right;
        self.bottom = bottom;
    }

    /// Display-side verdict: a face whose score exceeds the attached threshold.
    pub fn is_live(&self) -> bool {
        self.has_face && self.confidence > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_box_reorders_inverted_corners() {
        let b = FaceBox::new(300, 250, 100, 50, 0.7);
        assert_eq!((b.left, b.top, b.right, b.bottom), (100, 50, 300, 250));
    }

    #[test]
    fn default_result_means_no_face() {
        let r = DetectionResult::default();
        assert!(!r.has_face);
        assert_eq!((r.left, r.top, r.right, r.bottom), (0, 0, 0, 0));
        assert_eq!(r.time_ms, 0);
        assert!(!r.is_live());
    }

    #[test]
    fn verdict_is_strictly_above_threshold() {
        let face = FaceBox::new(0, 0, 10, 10, 0.915);
        let at = DetectionResult::from_face(&face, 3).with_threshold(0.915);
        assert!(!at.is_live());

        let above = DetectionResult::from_face(&FaceBox { confidence: 0.95, ..face }, 3)
            .with_threshold(0.915);
        assert!(above.is_live());
    }

    #[test]
    fn orientation_passes_unknown_codes_through() {
        assert_eq!(Orientation::from(7), Orientation::TRANSVERSE);
        assert_eq!(Orientation::from(42).code(), 42);
        assert_eq!(Orientation::default(), Orientation::NONE);
    }
}
