//! Edge-preserving bilateral smoothing.

use super::border::reflect101_signed;
use crate::accel::{expect_len, Acceleration};
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer, LevelScaler};
use crate::parallel::for_each_row_mut;

/// Window diameter per unit of smoothing sigma.
pub const DIAMETER_PER_SIGMA: f32 = 4.0;
/// Range (intensity) sigma per unit of smoothing sigma, in 8-bit levels.
pub const COLOR_SIGMA_PER_SIGMA: f32 = 20.0;
/// Spatial sigma per unit of smoothing sigma, in pixels.
pub const SPACE_SIGMA_PER_SIGMA: f32 = 3.0;
pub const MIN_DIAMETER: i32 = 3;

/// Bilateral parameters derived from a single smoothing strength.
///
/// Returns `(diameter, sigma_color, sigma_space)` with the diameter forced
/// odd and at least 3.
pub fn noise_smoothing_params(sigma: f32) -> (i32, f32, f32) {
    let diameter = ((sigma * DIAMETER_PER_SIGMA).round() as i32 | 1).max(MIN_DIAMETER);
    (
        diameter,
        sigma * COLOR_SIGMA_PER_SIGMA,
        sigma * SPACE_SIGMA_PER_SIGMA,
    )
}

/// Noise smoothing with a single strength knob.
pub fn noise_smoothing(
    image: &ImageBuffer,
    sigma: f32,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    let (diameter, sigma_color, sigma_space) = noise_smoothing_params(sigma);
    tracing::trace!(sigma, diameter, sigma_color, sigma_space, "noise smoothing");
    bilateral_filter(image, diameter, sigma_color, sigma_space, accel)
}

/// Bilateral filter on 8-bit levels derived from each channel's own range.
///
/// Values are rescaled with `(v - min) / (max - min) * 255` (a zero range is
/// treated as 1), filtered, and mapped back to the original range and element
/// type.
pub fn bilateral_filter(
    image: &ImageBuffer,
    diameter: i32,
    sigma_color: f32,
    sigma_space: f32,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let (width, height) = (image.width(), image.height());

    map_channels(image, |plane| {
        let values = plane.to_f32();
        let Some(scaler) = LevelScaler::observe(&values) else {
            return Ok(plane.clone());
        };
        let scaler = scaler.with_unit_floor();
        let levels = scaler.to_u8_levels(&values);

        let filtered = accel.run(
            "bilateral",
            |backend| {
                backend
                    .bilateral(&levels, width, height, diameter, sigma_color, sigma_space)
                    .and_then(|out| expect_len(out, levels.len()))
            },
            || bilateral_levels(&levels, width, height, diameter, sigma_color, sigma_space),
        );

        Ok(plane.with_values(scaler.from_levels(&filtered, LevelScaler::U8_LEVELS)))
    })
}

/// Spatial offsets and weights of the circular bilateral window.
pub(crate) struct BilateralKernel {
    pub radius: usize,
    /// `(dy, dx, spatial_weight)`
    pub taps: Vec<(isize, isize, f32)>,
    /// Range weight indexed by absolute level difference
    pub color_weights: [f32; 256],
}

impl BilateralKernel {
    /// Non-positive sigmas are treated as 1; a non-positive diameter derives
    /// the radius from the spatial sigma.
    pub fn new(diameter: i32, sigma_color: f32, sigma_space: f32) -> Self {
        let sigma_color = if sigma_color <= 0.0 { 1.0 } else { sigma_color };
        let sigma_space = if sigma_space <= 0.0 { 1.0 } else { sigma_space };
        let radius = if diameter <= 0 {
            (sigma_space * 1.5).round() as usize
        } else {
            (diameter / 2) as usize
        }
        .max(1);

        let color_coeff = -0.5 / (sigma_color as f64 * sigma_color as f64);
        let space_coeff = -0.5 / (sigma_space as f64 * sigma_space as f64);

        let mut color_weights = [0.0f32; 256];
        for (i, w) in color_weights.iter_mut().enumerate() {
            *w = ((i * i) as f64 * color_coeff).exp() as f32;
        }

        let r = radius as isize;
        let mut taps = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let dist = ((dy * dy + dx * dx) as f64).sqrt();
                if dist > radius as f64 {
                    continue;
                }
                taps.push((dy, dx, (dist * dist * space_coeff).exp() as f32));
            }
        }

        Self {
            radius,
            taps,
            color_weights,
        }
    }
}

/// CPU bilateral filter over 8-bit levels with reflect-101 borders.
pub fn bilateral_levels(
    levels: &[f32],
    width: usize,
    height: usize,
    diameter: i32,
    sigma_color: f32,
    sigma_space: f32,
) -> Vec<f32> {
    let mut out = vec![0.0f32; levels.len()];
    if levels.is_empty() {
        return out;
    }
    let kernel = BilateralKernel::new(diameter, sigma_color, sigma_space);

    for_each_row_mut(&mut out, width, |y, row| {
        for (x, out_v) in row.iter_mut().enumerate() {
            let center = levels[y * width + x];
            let mut sum = 0.0f32;
            let mut wsum = 0.0f32;
            for &(dy, dx, space_w) in &kernel.taps {
                let sy = reflect101_signed(y as isize + dy, height);
                let sx = reflect101_signed(x as isize + dx, width);
                let v = levels[sy * width + sx];
                let diff = ((v - center).abs() as usize).min(255);
                let w = space_w * kernel.color_weights[diff];
                sum += v * w;
                wsum += w;
            }
            *out_v = (sum / wsum).round().clamp(0.0, 255.0);
        }
    });

    out
}
