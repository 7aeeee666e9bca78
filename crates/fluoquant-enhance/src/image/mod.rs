//! Image buffers and element-type handling.
//!
//! An [`ImageBuffer`] is a dense row-major array with interleaved channels
//! (height x width x channels). Every stage reads one buffer and returns a new,
//! independently owned buffer of the same shape and element type.

mod channels;
mod range;

pub use channels::{merge_channels, map_channels, split_channels};
pub use range::{from_unit_range, to_unit_range, LevelScaler, UNIT_EPSILON};

use crate::error::EnhanceError;

/// Element type of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    U16,
    F32,
}

impl PixelType {
    /// Largest representable value; 1.0 for floating buffers (the unit domain).
    pub fn max_value(self) -> f32 {
        match self {
            PixelType::U8 => 255.0,
            PixelType::U16 => 65535.0,
            PixelType::F32 => 1.0,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, PixelType::F32)
    }

    /// Round and clamp a working value into this type's representable range.
    /// Floating values pass through.
    #[inline]
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            PixelType::F32 => value,
            _ => value.round().clamp(0.0, self.max_value()),
        }
    }
}

/// Typed pixel storage.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelData::U8(_) => PixelType::U8,
            PixelData::U16(_) => PixelType::U16,
            PixelData::F32(_) => PixelType::F32,
        }
    }

    /// Widen every element to `f32` without rescaling.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            PixelData::U8(v) => v.iter().map(|&x| x as f32).collect(),
            PixelData::U16(v) => v.iter().map(|&x| x as f32).collect(),
            PixelData::F32(v) => v.clone(),
        }
    }

    /// Narrow working values into `pixel_type`, rounding and saturating
    /// integer targets.
    pub fn from_f32(values: Vec<f32>, pixel_type: PixelType) -> Self {
        match pixel_type {
            PixelType::U8 => PixelData::U8(
                values
                    .iter()
                    .map(|&v| PixelType::U8.quantize(v) as u8)
                    .collect(),
            ),
            PixelType::U16 => PixelData::U16(
                values
                    .iter()
                    .map(|&v| PixelType::U16.quantize(v) as u16)
                    .collect(),
            ),
            PixelType::F32 => PixelData::F32(values),
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            PixelData::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            PixelData::U16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            PixelData::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Dense image buffer: `height x width x channels`, row-major, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    channels: usize,
    data: PixelData,
}

impl ImageBuffer {
    /// Create a buffer, validating that the data length matches the shape.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: PixelData,
    ) -> Result<Self, EnhanceError> {
        if channels == 0 || data.len() != width * height * channels {
            return Err(EnhanceError::ShapeMismatch {
                width,
                height,
                channels,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_u8(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, EnhanceError> {
        Self::new(width, height, channels, PixelData::U8(data))
    }

    pub fn from_u16(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u16>,
    ) -> Result<Self, EnhanceError> {
        Self::new(width, height, channels, PixelData::U16(data))
    }

    pub fn from_f32(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, EnhanceError> {
        Self::new(width, height, channels, PixelData::F32(data))
    }

    /// Build a buffer of `pixel_type` from working values, rounding and
    /// saturating for integer types.
    pub fn from_working(
        width: usize,
        height: usize,
        channels: usize,
        pixel_type: PixelType,
        values: Vec<f32>,
    ) -> Result<Self, EnhanceError> {
        Self::new(width, height, channels, PixelData::from_f32(values, pixel_type))
    }

    /// Same shape and element type as `self`, filled from working values.
    ///
    /// Callers guarantee `values.len() == self.len()`.
    pub(crate) fn with_values(&self, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), self.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: PixelData::from_f32(values, self.pixel_type()),
        }
    }

    /// Same shape as `self` with floating storage.
    pub(crate) fn with_f32(&self, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), self.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: PixelData::F32(values),
        }
    }

    /// Same shape as `self` with replacement storage of equal length.
    pub(crate) fn with_data(&self, data: PixelData) -> Self {
        debug_assert_eq!(data.len(), self.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn into_data(self) -> PixelData {
        self.data
    }

    /// Total element count (`width * height * channels`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for zero-dimension buffers, which every stage returns unchanged.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// All elements widened to `f32`, unscaled.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.to_f32()
    }

    /// Observed minimum and maximum, or `None` for an empty buffer.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        min_max(&self.to_f32())
    }

    /// Mean and population standard deviation of all elements.
    pub fn mean_std(&self) -> (f64, f64) {
        mean_std(&self.to_f32())
    }
}

/// Minimum and maximum of a slice, ignoring NaN.
pub(crate) fn min_max(values: &[f32]) -> Option<(f32, f32)> {
    let mut iter = values.iter().copied().filter(|v| !v.is_nan());
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

pub(crate) fn mean_std(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests;
