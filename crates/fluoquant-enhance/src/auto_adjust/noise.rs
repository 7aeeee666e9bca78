//! Noise level from the residual against a 3x3 median.

use crate::image::{split_channels, ImageBuffer};
use crate::stages::median_plane;

/// Sigma gained per unit of normalized residual.
/// Heuristic; recalibrate against representative data before relying on it.
pub const NOISE_GAIN: f64 = 200.0;
pub const MIN_NOISE_SIGMA: f64 = 1.0;
pub const MAX_NOISE_SIGMA: f64 = 5.0;

/// Median of `|image - median3x3(image)|` over every element of every
/// channel. Even counts average the two middle values.
pub fn median_residual(image: &ImageBuffer) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    let (width, height) = (image.width(), image.height());
    let mut residuals = Vec::with_capacity(image.len());
    for plane in split_channels(image) {
        let values = plane.to_f32();
        let smoothed = median_plane(&values, width, height, 3);
        residuals.extend(values.iter().zip(&smoothed).map(|(v, m)| (v - m).abs()));
    }

    residuals.sort_unstable_by(f32::total_cmp);
    let mid = residuals.len() / 2;
    if residuals.len() % 2 == 0 {
        (residuals[mid - 1] as f64 + residuals[mid] as f64) / 2.0
    } else {
        residuals[mid] as f64
    }
}

/// Map a residual to a smoothing sigma in `[1, 5]`.
pub fn noise_sigma_from_residual(residual: f64, max_value: f64) -> f64 {
    let normalized = if max_value > 0.0 { residual / max_value } else { 0.0 };
    (MIN_NOISE_SIGMA + normalized * NOISE_GAIN).clamp(MIN_NOISE_SIGMA, MAX_NOISE_SIGMA)
}
