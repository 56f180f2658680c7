//! NV21 frame buffers and their size precondition.

use crate::error::InputError;
use crate::types::Orientation;

/// Expected byte length of a YUV 4:2:0 (NV21) frame: a full-resolution luma
/// plane followed by interleaved quarter-resolution chroma.
///
/// `None` when the length does not fit in `usize`.
pub fn nv21_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
        .map(|n| n / 2)
}

/// Reject a buffer whose length does not match `width * height * 3 / 2`.
pub fn validate_nv21(data: &[u8], width: u32, height: u32) -> Result<(), InputError> {
    let expected = nv21_len(width, height).ok_or(InputError::Dimensions { width, height })?;
    if data.len() != expected {
        return Err(InputError::FrameSize {
            width,
            height,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// An owned preview frame as delivered by the capture source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, orientation: Orientation) -> Self {
        Self {
            data,
            width,
            height,
            orientation,
        }
    }

    /// A mid-grey frame of the right size. Empty if the size overflows.
    pub fn blank(width: u32, height: u32, orientation: Orientation) -> Self {
        let len = nv21_len(width, height).unwrap_or(0);
        Self::new(vec![128; len], width, height, orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vga_frame_length() {
        assert_eq!(nv21_len(640, 480), Some(460_800));
    }

    #[test]
    fn accepts_exact_length() {
        let frame = Frame::blank(640, 480, Orientation::NONE);
        assert!(validate_nv21(&frame.data, frame.width, frame.height).is_ok());
    }

    #[test]
    fn oversized_dimensions_are_invalid_input() {
        let err = validate_nv21(&[0u8; 4], u32::MAX, u32::MAX).unwrap_err();
        assert_eq!(
            err,
            InputError::Dimensions {
                width: u32::MAX,
                height: u32::MAX
            }
        );
        assert!(Frame::blank(u32::MAX, u32::MAX, Orientation::NONE).data.is_empty());
    }

    #[test]
    fn rejects_short_and_long_buffers() {
        for len in [0usize, 460_799, 460_801, 640 * 480] {
            let err = validate_nv21(&vec![0u8; len], 640, 480).unwrap_err();
            assert_eq!(
                err,
                InputError::FrameSize {
                    width: 640,
                    height: 480,
                    expected: 460_800,
                    actual: len,
                }
            );
        }
    }

    #[test]
    fn zero_sized_frame_needs_empty_buffer() {
        assert!(validate_nv21(&[], 0, 0).is_ok());
        assert!(validate_nv21(&[0], 0, 0).is_err());
    }
}
