//! Percentile-anchored intensity stretch.

use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer, PixelData};
use crate::parallel::parallel_fold_reduce;

/// Windows narrower than this are treated as degenerate.
const MIN_WINDOW: f32 = 1e-6;

/// Linearly remap each channel so its `low_p` percentile lands on the
/// channel's minimum and its `high_p` percentile on its maximum, clamping
/// outside the window.
///
/// Percentiles and the output range are taken per channel, so each channel
/// keeps its own minimum and maximum; this is not a whole-buffer stretch.
/// Percentiles are clipped to `[0, 100]`. An inverted or empty window, or a
/// degenerate intensity range, returns the input unchanged.
pub fn percentile_stretch(
    image: &ImageBuffer,
    low_p: f32,
    high_p: f32,
) -> Result<ImageBuffer, EnhanceError> {
    let low_p = low_p.clamp(0.0, 100.0);
    let high_p = high_p.clamp(0.0, 100.0);
    if image.is_empty() || !(low_p < high_p) {
        return Ok(image.clone());
    }

    map_channels(image, |plane| {
        let Some((low, high)) = percentiles(plane.data(), low_p, high_p) else {
            return Ok(plane.clone());
        };
        if high - low < MIN_WINDOW {
            return Ok(plane.clone());
        }
        let Some((out_min, out_max)) = plane.min_max() else {
            return Ok(plane.clone());
        };

        let window = high - low;
        let span = out_max - out_min;
        let values = plane
            .to_f32()
            .into_iter()
            .map(|v| ((v - low) / window).clamp(0.0, 1.0) * span + out_min)
            .collect();
        Ok(plane.with_values(values))
    })
}

/// Two percentiles of the whole buffer.
///
/// Integer data uses the cumulative histogram: the first level whose
/// cumulative share reaches `p`. Floating data interpolates linearly between
/// order statistics.
pub fn percentiles(data: &PixelData, low_p: f32, high_p: f32) -> Option<(f32, f32)> {
    match data {
        PixelData::U8(v) => {
            let hist = histogram_u8(v);
            Some((
                histogram_percentile(&hist, low_p)?,
                histogram_percentile(&hist, high_p)?,
            ))
        }
        PixelData::U16(v) => {
            let hist = histogram_u16(v);
            Some((
                histogram_percentile(&hist, low_p)?,
                histogram_percentile(&hist, high_p)?,
            ))
        }
        PixelData::F32(v) => {
            let mut sorted: Vec<f32> = v.iter().copied().filter(|x| !x.is_nan()).collect();
            if sorted.is_empty() {
                return None;
            }
            sorted.sort_unstable_by(f32::total_cmp);
            Some((
                interpolated_percentile(&sorted, low_p),
                interpolated_percentile(&sorted, high_p),
            ))
        }
    }
}

fn histogram_u8(values: &[u8]) -> Vec<u64> {
    let mut hist = vec![0u64; 256];
    for &v in values {
        hist[v as usize] += 1;
    }
    hist
}

fn histogram_u16(values: &[u16]) -> Vec<u64> {
    parallel_fold_reduce(
        values,
        16_384,
        || vec![0u64; 65536],
        |mut acc, chunk| {
            for &v in chunk {
                acc[v as usize] += 1;
            }
            acc
        },
        |mut a, b| {
            for (x, y) in a.iter_mut().zip(&b) {
                *x += y;
            }
            a
        },
    )
}

fn histogram_percentile(hist: &[u64], p: f32) -> Option<f32> {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return None;
    }
    let mut cumulative = 0u64;
    for (level, &count) in hist.iter().enumerate() {
        cumulative += count;
        if cumulative > 0 && cumulative as f64 * 100.0 >= p as f64 * total as f64 {
            return Some(level as f32);
        }
    }
    hist.iter().rposition(|&c| c > 0).map(|l| l as f32)
}

fn interpolated_percentile(sorted: &[f32], p: f32) -> f32 {
    let rank = p as f64 / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
