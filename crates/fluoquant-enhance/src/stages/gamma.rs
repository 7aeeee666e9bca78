//! Power-law intensity mapping.

use crate::image::{ImageBuffer, PixelData, PixelType};

/// Raise every value to `gamma` after normalizing by the element type's
/// maximum (255, 65535, or 1.0 for floating data).
///
/// `gamma == 1.0` returns an identical copy; negative values are clamped to
/// zero first. Integer data goes through a full look-up table.
pub fn apply_gamma(image: &ImageBuffer, gamma: f32) -> ImageBuffer {
    if gamma == 1.0 || image.is_empty() {
        return image.clone();
    }
    let max = image.pixel_type().max_value();
    let curve = |v: f32| (v.max(0.0) / max).powf(gamma) * max;

    let data = match image.data() {
        PixelData::U8(values) => {
            let lut: Vec<u8> = (0..=u8::MAX)
                .map(|v| PixelType::U8.quantize(curve(v as f32)) as u8)
                .collect();
            PixelData::U8(values.iter().map(|&v| lut[v as usize]).collect())
        }
        PixelData::U16(values) => {
            let lut: Vec<u16> = (0..=u16::MAX)
                .map(|v| PixelType::U16.quantize(curve(v as f32)) as u16)
                .collect();
            PixelData::U16(values.iter().map(|&v| lut[v as usize]).collect())
        }
        PixelData::F32(values) => PixelData::F32(values.iter().map(|&v| curve(v)).collect()),
    };
    image.with_data(data)
}

/// Gamma in its fixed display position at the end of the pipeline.
pub fn display_gamma(image: &ImageBuffer, gamma: f32) -> ImageBuffer {
    apply_gamma(image, gamma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_gamma_is_identity() {
        let img = ImageBuffer::from_f32(3, 1, 1, vec![-0.5, 0.25, 7.0]).unwrap();
        assert_eq!(apply_gamma(&img, 1.0), img);
        let img = ImageBuffer::from_u16(2, 1, 1, vec![0, 65535]).unwrap();
        assert_eq!(display_gamma(&img, 1.0), img);
    }

    #[test]
    fn test_u8_gamma_uses_type_maximum() {
        let img = ImageBuffer::from_u8(4, 1, 1, vec![0, 64, 128, 255]).unwrap();
        let out = apply_gamma(&img, 0.5);
        // sqrt(64 / 255) * 255 = 127.75
        assert_eq!(out.data().as_u8().unwrap(), &[0, 128, 181, 255]);
    }

    #[test]
    fn test_float_negatives_clamped() {
        let img = ImageBuffer::from_f32(3, 1, 1, vec![-0.2, 0.25, 1.0]).unwrap();
        let out = apply_gamma(&img, 2.0);
        assert_eq!(out.data().as_f32().unwrap(), &[0.0, 0.0625, 1.0]);
    }

    #[test]
    fn test_gamma_is_monotone_for_u16() {
        let img = ImageBuffer::from_u16(5, 1, 1, vec![0, 100, 1000, 30000, 65535]).unwrap();
        let out = apply_gamma(&img, 1.7);
        let values = out.data().as_u16().unwrap();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values[4], 65535);
    }
}
