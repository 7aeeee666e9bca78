//! Automatic parameter suggestions
//!
//! Derives starting values for every pipeline stage from image statistics.
//! Suggestions never enable a stage; hosts merge them into a
//! [`StageConfig`](crate::config::StageConfig) with
//! [`merge_auto`](crate::config::StageConfig::merge_auto) or map slider
//! percentages through [`EnhancePercents`].

mod noise;
mod percents;

#[cfg(test)]
mod tests;

pub use noise::{
    median_residual, noise_sigma_from_residual, MAX_NOISE_SIGMA, MIN_NOISE_SIGMA, NOISE_GAIN,
};
pub use percents::EnhancePercents;

use serde::{Deserialize, Serialize};

use crate::image::{ImageBuffer, PixelData, PixelType, UNIT_EPSILON};

/// Longest side of the thumbnail statistics are computed on.
pub const ANALYSIS_MAX_SIDE: usize = 256;

/// The signal radius is the longest image side over this divisor.
/// Heuristic; recalibrate against representative data before relying on it.
pub const RADIUS_DIVISOR: f64 = 50.0;
pub const MIN_SIGNAL_RADIUS: usize = 10;
pub const MAX_SIGNAL_RADIUS: usize = 50;

pub const DEFAULT_STRETCH_CLIP: f64 = 2.0;
pub const DEFAULT_CONTRAST_CLIP: f64 = 1.5;

/// Suggested stage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoParams {
    /// Percent clipped from each tail by the stretch
    pub stretch_clip: f64,

    /// Top-hat element diameter (4x the signal radius)
    pub bg_kernel: usize,

    pub contrast_clip: f64,

    /// Tiles per axis (2x the signal radius)
    pub contrast_tile: usize,

    pub noise_sigma: f64,

    pub gamma: f64,
}

impl AutoParams {
    fn for_radius(radius: usize, noise_sigma: f64) -> Self {
        Self {
            stretch_clip: DEFAULT_STRETCH_CLIP,
            bg_kernel: radius * 4,
            contrast_clip: DEFAULT_CONTRAST_CLIP,
            contrast_tile: radius * 2,
            noise_sigma,
            gamma: 1.0,
        }
    }
}

impl Default for AutoParams {
    fn default() -> Self {
        Self::for_radius(MIN_SIGNAL_RADIUS, MIN_NOISE_SIGMA)
    }
}

/// Typical signal radius in pixels for an image of the given size.
pub fn estimate_signal_radius(width: usize, height: usize) -> usize {
    let radius = (width.max(height) as f64 / RADIUS_DIVISOR).round() as usize;
    radius.clamp(MIN_SIGNAL_RADIUS, MAX_SIGNAL_RADIUS)
}

/// Suggest parameters for `image`.
///
/// Radius-based values use the full-resolution size; the noise estimate runs
/// on a nearest-neighbour thumbnail no larger than [`ANALYSIS_MAX_SIDE`].
pub fn estimate_auto_params(image: &ImageBuffer) -> AutoParams {
    if image.is_empty() {
        return AutoParams::default();
    }
    let radius = estimate_signal_radius(image.width(), image.height());
    let thumbnail = downsample_nearest(image, ANALYSIS_MAX_SIDE);
    let residual = median_residual(&thumbnail);
    let noise_sigma = noise_sigma_from_residual(residual, residual_scale(image) as f64);

    let params = AutoParams::for_radius(radius, noise_sigma);
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        radius,
        residual,
        noise_sigma,
        "estimated auto parameters"
    );
    params
}

/// Full-scale value the noise residual is measured against: the type range
/// for integer data, the observed maximum for floating data.
fn residual_scale(image: &ImageBuffer) -> f32 {
    match image.pixel_type() {
        PixelType::U8 | PixelType::U16 => image.pixel_type().max_value(),
        PixelType::F32 => image
            .min_max()
            .map(|(_, hi)| hi.max(UNIT_EPSILON))
            .unwrap_or(1.0),
    }
}

/// Nearest-neighbour resize so the longest side is at most `max_side`.
/// Images already within the limit are returned as a copy.
pub fn downsample_nearest(image: &ImageBuffer, max_side: usize) -> ImageBuffer {
    let (width, height) = (image.width(), image.height());
    let longest = width.max(height);
    if longest <= max_side || longest == 0 {
        return image.clone();
    }
    let new_w = (width * max_side / longest).max(1);
    let new_h = (height * max_side / longest).max(1);
    let channels = image.channels();

    let xs: Vec<usize> = (0..new_w).map(|x| (x * width / new_w).min(width - 1)).collect();
    let ys: Vec<usize> = (0..new_h).map(|y| (y * height / new_h).min(height - 1)).collect();

    fn gather<T: Copy>(
        src: &[T],
        xs: &[usize],
        ys: &[usize],
        width: usize,
        channels: usize,
    ) -> Vec<T> {
        let mut out = Vec::with_capacity(xs.len() * ys.len() * channels);
        for &sy in ys {
            for &sx in xs {
                let base = (sy * width + sx) * channels;
                out.extend_from_slice(&src[base..base + channels]);
            }
        }
        out
    }

    let data = match image.data() {
        PixelData::U8(v) => PixelData::U8(gather(v, &xs, &ys, width, channels)),
        PixelData::U16(v) => PixelData::U16(gather(v, &xs, &ys, width, channels)),
        PixelData::F32(v) => PixelData::F32(gather(v, &xs, &ys, width, channels)),
    };
    ImageBuffer::new(new_w, new_h, channels, data).unwrap_or_else(|_| image.clone())
}
