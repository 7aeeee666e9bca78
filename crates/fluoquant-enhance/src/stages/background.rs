//! Background suppression by white top-hat.

use super::morphology::{self, normalize_kernel_size, StructuringElement};
use crate::accel::{expect_len, Acceleration};
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer};

/// Strengths this close to 1 use the suppressed image directly.
pub const FULL_STRENGTH_TOLERANCE: f32 = 0.01;

/// Subtract the morphological opening with an elliptical element of
/// `kernel_size` diameter (forced odd, at least 3).
///
/// The accelerated path is tried first; any failure falls back to the CPU.
pub fn background_suppression(
    image: &ImageBuffer,
    kernel_size: usize,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let element = StructuringElement::ellipse(normalize_kernel_size(kernel_size));
    top_hat_with(image, &element, accel)
}

/// Top-hat with a caller-supplied structuring element, per channel.
pub fn top_hat_with(
    image: &ImageBuffer,
    element: &StructuringElement,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let (width, height) = (image.width(), image.height());
    map_channels(image, |plane| {
        let values = plane.to_f32();
        let result = accel.run(
            "background",
            |backend| {
                backend
                    .top_hat(&values, width, height, element)
                    .and_then(|out| expect_len(out, values.len()))
            },
            || morphology::top_hat(&values, width, height, element),
        );
        Ok(plane.with_values(result))
    })
}

/// `(1 - strength) * original + strength * suppressed`.
///
/// Strength is clamped to `[0, 1]`; within [`FULL_STRENGTH_TOLERANCE`] of 1
/// the suppressed buffer is returned as is.
pub fn blend_background(
    original: &ImageBuffer,
    suppressed: ImageBuffer,
    strength: f32,
) -> Result<ImageBuffer, EnhanceError> {
    if (strength - 1.0).abs() < FULL_STRENGTH_TOLERANCE {
        return Ok(suppressed);
    }
    if original.len() != suppressed.len() || original.pixel_type() != suppressed.pixel_type() {
        return Err(EnhanceError::ChannelMismatch(
            "blend operands differ in shape or element type".to_string(),
        ));
    }
    let s = strength.clamp(0.0, 1.0);
    let values = original
        .to_f32()
        .iter()
        .zip(suppressed.to_f32())
        .map(|(o, t)| o * (1.0 - s) + t * s)
        .collect();
    Ok(original.with_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelType;

    fn spot_on_ramp() -> ImageBuffer {
        let (w, h) = (32, 32);
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                let base = 1000 + x as u16 * 10;
                if (14..17).contains(&x) && (14..17).contains(&y) {
                    base + 5000
                } else {
                    base
                }
            })
            .collect();
        ImageBuffer::from_u16(w, h, 1, data).unwrap()
    }

    #[test]
    fn test_suppression_removes_smooth_background() {
        let img = spot_on_ramp();
        let out = background_suppression(&img, 9, Acceleration::Cpu).unwrap();
        assert_eq!(out.pixel_type(), PixelType::U16);
        let values = out.to_f32();
        assert!(values[15 * 32 + 15] >= 5000.0);
        assert!(values[2 * 32 + 2] < 100.0);
    }

    #[test]
    fn test_blend_zero_strength_is_original() {
        let img = spot_on_ramp();
        let suppressed = background_suppression(&img, 9, Acceleration::Cpu).unwrap();
        assert_eq!(blend_background(&img, suppressed, 0.0).unwrap(), img);
    }

    #[test]
    fn test_blend_near_one_returns_suppressed() {
        let img = spot_on_ramp();
        let suppressed = background_suppression(&img, 9, Acceleration::Cpu).unwrap();
        let out = blend_background(&img, suppressed.clone(), 0.995).unwrap();
        assert_eq!(out, suppressed);
    }

    #[test]
    fn test_blend_half_is_midpoint() {
        let original = ImageBuffer::from_u8(2, 1, 1, vec![100, 200]).unwrap();
        let suppressed = ImageBuffer::from_u8(2, 1, 1, vec![0, 100]).unwrap();
        let out = blend_background(&original, suppressed, 0.5).unwrap();
        assert_eq!(out.data().as_u8().unwrap(), &[50, 150]);
    }

    #[test]
    fn test_blend_rejects_mismatched_operands() {
        let original = ImageBuffer::from_u8(2, 1, 1, vec![1, 2]).unwrap();
        let suppressed = ImageBuffer::from_u16(2, 1, 1, vec![1, 2]).unwrap();
        assert!(blend_background(&original, suppressed, 0.5).is_err());
    }
}
