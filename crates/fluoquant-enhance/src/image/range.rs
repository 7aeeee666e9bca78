//! Dynamic-range adaptation between element types and the unit float domain.

use super::{min_max, ImageBuffer, PixelData, PixelType};

/// Floor for the floating scale so all-zero input never divides by zero.
pub const UNIT_EPSILON: f32 = 1e-6;

/// Normalize any buffer into `[0, 1]` floats.
///
/// Returns the unit buffer and the scale that maps it back: 65535 for 16-bit,
/// 255 for 8-bit, and the observed maximum (floored at [`UNIT_EPSILON`]) for
/// floating input.
pub fn to_unit_range(image: &ImageBuffer) -> (ImageBuffer, f32) {
    let scale = match image.pixel_type() {
        PixelType::U8 | PixelType::U16 => image.pixel_type().max_value(),
        PixelType::F32 => image
            .min_max()
            .map(|(_, hi)| hi.max(UNIT_EPSILON))
            .unwrap_or(1.0),
    };
    let inv = 1.0 / scale;
    let values = image.to_f32().into_iter().map(|v| v * inv).collect();
    (image.with_f32(values), scale)
}

/// Map a unit-range buffer back to `pixel_type` using `scale`.
///
/// Values are clipped to `[0, 1]` before scaling, then rounded and clamped to
/// the representable range for integer types.
pub fn from_unit_range(unit: &ImageBuffer, pixel_type: PixelType, scale: f32) -> ImageBuffer {
    let values = unit
        .to_f32()
        .into_iter()
        .map(|v| v.clamp(0.0, 1.0) * scale)
        .collect();
    ImageBuffer {
        width: unit.width,
        height: unit.height,
        channels: unit.channels,
        data: PixelData::from_f32(values, pixel_type),
    }
}

/// Min/max rescaler into a fixed level domain (8-bit or 16-bit) and back.
///
/// Several stages run their kernel on levels derived from the buffer's own
/// observed range rather than its element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelScaler {
    min: f32,
    range: f32,
}

impl LevelScaler {
    pub const U8_LEVELS: f32 = 255.0;
    pub const U16_LEVELS: f32 = 65535.0;

    /// Observe the range of `values`; `None` when empty.
    pub fn observe(values: &[f32]) -> Option<Self> {
        min_max(values).map(|(lo, hi)| Self {
            min: lo,
            range: hi - lo,
        })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn is_flat(&self) -> bool {
        self.range <= 0.0
    }

    /// Replace a zero range with 1 so flat input maps to level 0 and back.
    pub fn with_unit_floor(self) -> Self {
        if self.is_flat() {
            Self {
                min: self.min,
                range: 1.0,
            }
        } else {
            self
        }
    }

    /// 8-bit levels, truncated toward zero.
    pub fn to_u8_levels(&self, values: &[f32]) -> Vec<f32> {
        values
            .iter()
            .map(|&v| {
                ((v - self.min) / self.range * Self::U8_LEVELS)
                    .clamp(0.0, Self::U8_LEVELS)
                    .trunc()
            })
            .collect()
    }

    /// 16-bit levels, rounded to nearest.
    pub fn to_u16_levels(&self, values: &[f32]) -> Vec<f32> {
        values
            .iter()
            .map(|&v| {
                ((v - self.min) / self.range * Self::U16_LEVELS)
                    .round()
                    .clamp(0.0, Self::U16_LEVELS)
            })
            .collect()
    }

    /// Inverse mapping: `level / max_level * range + min`.
    pub fn from_levels(&self, levels: &[f32], max_level: f32) -> Vec<f32> {
        levels
            .iter()
            .map(|&l| l / max_level * self.range + self.min)
            .collect()
    }
}
