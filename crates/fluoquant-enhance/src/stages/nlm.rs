//! Non-local-means denoising on 8-bit levels.

use super::border::reflect101_signed;
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer, LevelScaler};
use crate::parallel::for_each_row_mut;

pub const DEFAULT_H: f32 = 10.0;
pub const TEMPLATE_WINDOW: usize = 7;
pub const SEARCH_WINDOW: usize = 21;
/// Patch weights below this are dropped.
const WEIGHT_THRESHOLD: f32 = 1e-3;

/// Denoise each channel with non-local means of strength `h`.
///
/// Channels are mapped to 8-bit levels through their own min/max, denoised
/// with a 7x7 template and 21x21 search window, and mapped back. A channel
/// with zero range (or `h <= 0`) is returned unchanged.
pub fn nlm_denoise(image: &ImageBuffer, h: f32) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() || !(h > 0.0) {
        return Ok(image.clone());
    }
    let (width, height) = (image.width(), image.height());

    map_channels(image, |plane| {
        let values = plane.to_f32();
        let Some(scaler) = LevelScaler::observe(&values) else {
            return Ok(plane.clone());
        };
        if scaler.is_flat() {
            return Ok(plane.clone());
        }
        let levels = scaler.to_u8_levels(&values);
        let denoised = nlm_levels(&levels, width, height, h, TEMPLATE_WINDOW, SEARCH_WINDOW);
        Ok(plane.with_values(scaler.from_levels(&denoised, LevelScaler::U8_LEVELS)))
    })
}

/// Non-local means over a single plane of 8-bit levels.
///
/// Each output pixel is the weighted mean of every pixel in its search
/// window, weighted by `exp(-mean_sq_patch_diff / h^2)` between the
/// surrounding templates. Borders are extended by reflect-101.
pub fn nlm_levels(
    levels: &[f32],
    width: usize,
    height: usize,
    h: f32,
    template: usize,
    search: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; levels.len()];
    if levels.is_empty() {
        return out;
    }

    let t = (template / 2) as isize;
    let s = (search / 2) as isize;
    let border = (t + s) as usize;
    let pw = width + 2 * border;
    let ph = height + 2 * border;
    let mut padded = vec![0.0f32; pw * ph];
    for py in 0..ph {
        let sy = reflect101_signed(py as isize - border as isize, height);
        for px in 0..pw {
            let sx = reflect101_signed(px as isize - border as isize, width);
            padded[py * pw + px] = levels[sy * width + sx];
        }
    }

    let tsize = (2 * t + 1) as usize;
    let inv_area = 1.0 / (tsize * tsize) as f32;
    let inv_h2 = 1.0 / (h * h);
    let b = border as isize;

    for_each_row_mut(&mut out, width, |y, row| {
        let cy = y as isize + b;
        let cols = width + tsize - 1;
        let mut colsum = vec![0.0f32; cols];
        let mut sum = vec![0.0f32; width];
        let mut wsum = vec![0.0f32; width];

        for dy in -s..=s {
            for dx in -s..=s {
                // Column sums of squared differences over the template rows.
                for (c, acc) in colsum.iter_mut().enumerate() {
                    let px = c as isize + b - t;
                    let mut total = 0.0f32;
                    for ty in -t..=t {
                        let a = padded[((cy + ty) as usize) * pw + px as usize];
                        let n = padded[((cy + dy + ty) as usize) * pw + (px + dx) as usize];
                        let d = a - n;
                        total += d * d;
                    }
                    *acc = total;
                }

                let mut window: f32 = colsum[..tsize].iter().sum();
                for x in 0..width {
                    if x > 0 {
                        window += colsum[x + tsize - 1] - colsum[x - 1];
                    }
                    let w = (-(window.max(0.0) * inv_area) * inv_h2).exp();
                    if w < WEIGHT_THRESHOLD {
                        continue;
                    }
                    let nx = (x as isize + b + dx) as usize;
                    let ny = (cy + dy) as usize;
                    sum[x] += w * padded[ny * pw + nx];
                    wsum[x] += w;
                }
            }
        }

        for ((o, s), w) in row.iter_mut().zip(&sum).zip(&wsum) {
            *o = (s / w).round().clamp(0.0, 255.0);
        }
    });

    out
}
