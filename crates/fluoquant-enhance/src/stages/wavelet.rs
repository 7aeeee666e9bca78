//! Wavelet-domain denoising with BayesShrink soft thresholds.
//!
//! Only the Haar basis (`haar` / `db1`) is available. Images are decomposed
//! with a separable orthonormal transform; odd lengths are extended by
//! repeating the last sample and cropped again on reconstruction.

use std::f32::consts::FRAC_1_SQRT_2;
use std::str::FromStr;

use crate::error::EnhanceError;
use crate::image::{from_unit_range, map_channels, to_unit_range, ImageBuffer};

/// Median absolute deviation to Gaussian sigma.
const MAD_TO_SIGMA: f32 = 0.6745;

/// Supported wavelet bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletBase {
    Haar,
}

impl FromStr for WaveletBase {
    type Err = EnhanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(WaveletBase::Haar),
            other => Err(EnhanceError::Wavelet(format!("unsupported wavelet base '{other}'"))),
        }
    }
}

/// Decomposition depth: three levels short of the maximum, at least one.
pub fn wavelet_levels(width: usize, height: usize) -> usize {
    let min_side = width.min(height);
    if min_side < 2 {
        return 1;
    }
    let max_level = (usize::BITS - 1 - min_side.leading_zeros()) as usize;
    max_level.saturating_sub(3).max(1)
}

/// Convert a sigma in source units to the unit domain used by the denoiser.
pub fn rescale_sigma(sigma: f32, scale: f32) -> f32 {
    if scale > 0.0 {
        sigma / scale
    } else {
        sigma
    }
}

/// Noise sigma from the finest diagonal detail band.
///
/// Zero coefficients are ignored; an image with no non-zero detail has
/// sigma 0.
pub fn estimate_sigma(values: &[f32], width: usize, height: usize) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let plane = Plane {
        width,
        height,
        data: values.to_vec(),
    };
    let (_, [_, _, diagonal]) = plane.forward();
    let mut magnitudes: Vec<f32> = diagonal
        .data
        .iter()
        .filter(|v| **v != 0.0)
        .map(|v| v.abs())
        .collect();
    median(&mut magnitudes).map_or(0.0, |m| m / MAD_TO_SIGMA)
}

/// Denoise every channel in the unit domain and return to the source type.
///
/// `sigma` is the noise level in unit-range terms (see [`rescale_sigma`]);
/// `None` estimates it per channel. The result is clipped to `[0, 1]` before
/// being scaled back.
pub fn wavelet_denoise(
    image: &ImageBuffer,
    base: &str,
    sigma: Option<f32>,
) -> Result<ImageBuffer, EnhanceError> {
    base.parse::<WaveletBase>()?;
    if image.is_empty() {
        return Ok(image.clone());
    }
    let (width, height) = (image.width(), image.height());

    map_channels(image, |plane| {
        let (unit, scale) = to_unit_range(plane);
        let values = unit.to_f32();
        let sigma = match sigma {
            Some(s) => s,
            None => estimate_sigma(&values, width, height),
        };
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(EnhanceError::Wavelet(format!("invalid noise sigma {sigma}")));
        }
        let denoised = denoise_plane(values, width, height, sigma);
        Ok(from_unit_range(
            &unit.with_f32(denoised),
            plane.pixel_type(),
            scale,
        ))
    })
}

/// BayesShrink over a multi-level Haar decomposition, clipped to `[0, 1]`.
pub fn denoise_plane(values: Vec<f32>, width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if sigma == 0.0 || values.is_empty() {
        return values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
    }
    let variance = sigma * sigma;
    let levels = wavelet_levels(width, height);

    let mut approx = Plane {
        width,
        height,
        data: values,
    };
    let mut stack = Vec::with_capacity(levels);
    for _ in 0..levels {
        if approx.width < 2 && approx.height < 2 {
            break;
        }
        let dims = (approx.width, approx.height);
        let (next, mut details) = approx.forward();
        for band in details.iter_mut() {
            let threshold = bayes_threshold(&band.data, variance);
            soft_threshold(&mut band.data, threshold);
        }
        stack.push((dims, details));
        approx = next;
    }

    while let Some(((w, h), details)) = stack.pop() {
        approx = Plane::inverse(&approx, &details, w, h);
    }

    approx.data.into_iter().map(|v| v.clamp(0.0, 1.0)).collect()
}

fn bayes_threshold(band: &[f32], variance: f32) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    let mean_sq = band.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>() / band.len() as f64;
    let signal = (mean_sq - variance as f64).max(f32::EPSILON as f64).sqrt();
    (variance as f64 / signal) as f32
}

fn soft_threshold(band: &mut [f32], threshold: f32) {
    for v in band.iter_mut() {
        let magnitude = v.abs() - threshold;
        *v = if magnitude > 0.0 { v.signum() * magnitude } else { 0.0 };
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    })
}

#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    /// One analysis level: approximation plus `[row-detail, column-detail,
    /// diagonal]` bands.
    fn forward(&self) -> (Plane, [Plane; 3]) {
        let half_w = self.width.div_ceil(2);
        let half_h = self.height.div_ceil(2);

        let mut lo = vec![0.0f32; half_w * self.height];
        let mut hi = vec![0.0f32; half_w * self.height];
        for y in 0..self.height {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            for i in 0..half_w {
                let (a, b) = pair(row, i);
                lo[y * half_w + i] = (a + b) * FRAC_1_SQRT_2;
                hi[y * half_w + i] = (a - b) * FRAC_1_SQRT_2;
            }
        }

        let columns = |src: &[f32]| {
            let mut low = vec![0.0f32; half_w * half_h];
            let mut high = vec![0.0f32; half_w * half_h];
            let mut column = vec![0.0f32; self.height];
            for x in 0..half_w {
                for (y, c) in column.iter_mut().enumerate() {
                    *c = src[y * half_w + x];
                }
                for i in 0..half_h {
                    let (a, b) = pair(&column, i);
                    low[i * half_w + x] = (a + b) * FRAC_1_SQRT_2;
                    high[i * half_w + x] = (a - b) * FRAC_1_SQRT_2;
                }
            }
            (low, high)
        };

        let (ll, lh) = columns(&lo);
        let (hl, hh) = columns(&hi);
        let band = |data| Plane {
            width: half_w,
            height: half_h,
            data,
        };
        (band(ll), [band(lh), band(hl), band(hh)])
    }

    /// One synthesis level, cropped to `width x height`.
    fn inverse(approx: &Plane, details: &[Plane; 3], width: usize, height: usize) -> Plane {
        let half_w = approx.width;
        let half_h = approx.height;
        let [lh, hl, hh] = details;

        let columns = |low: &[f32], high: &[f32]| {
            let mut out = vec![0.0f32; half_w * height];
            for x in 0..half_w {
                for i in 0..half_h {
                    let (l, h) = (low[i * half_w + x], high[i * half_w + x]);
                    let top = 2 * i;
                    if top < height {
                        out[top * half_w + x] = (l + h) * FRAC_1_SQRT_2;
                    }
                    if top + 1 < height {
                        out[(top + 1) * half_w + x] = (l - h) * FRAC_1_SQRT_2;
                    }
                }
            }
            out
        };

        let lo = columns(&approx.data, &lh.data);
        let hi = columns(&hl.data, &hh.data);

        let mut data = vec![0.0f32; width * height];
        for y in 0..height {
            for i in 0..half_w {
                let (l, h) = (lo[y * half_w + i], hi[y * half_w + i]);
                let left = 2 * i;
                if left < width {
                    data[y * width + left] = (l + h) * FRAC_1_SQRT_2;
                }
                if left + 1 < width {
                    data[y * width + left + 1] = (l - h) * FRAC_1_SQRT_2;
                }
            }
        }
        Plane {
            width,
            height,
            data,
        }
    }
}

/// Sample pair `i`; the last sample is repeated for odd lengths.
#[inline]
fn pair(values: &[f32], i: usize) -> (f32, f32) {
    let a = values[2 * i];
    let b = values.get(2 * i + 1).copied().unwrap_or(a);
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelType;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_plane(width: usize, height: usize, amplitude: f32, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..width * height)
            .map(|_| 0.5 + rng.gen_range(-amplitude..amplitude))
            .collect()
    }

    #[test]
    fn test_base_names() {
        assert_eq!("db1".parse::<WaveletBase>().unwrap(), WaveletBase::Haar);
        assert_eq!("Haar".parse::<WaveletBase>().unwrap(), WaveletBase::Haar);
        assert!(matches!(
            "sym4".parse::<WaveletBase>(),
            Err(EnhanceError::Wavelet(_))
        ));
    }

    #[test]
    fn test_levels() {
        assert_eq!(wavelet_levels(512, 512), 6);
        assert_eq!(wavelet_levels(100, 300), 3);
        assert_eq!(wavelet_levels(8, 8), 1);
        assert_eq!(wavelet_levels(1, 1), 1);
    }

    #[test]
    fn test_transform_is_invertible_for_odd_sizes() {
        let plane = Plane {
            width: 7,
            height: 5,
            data: (0..35).map(|i| (i * 13 % 17) as f32).collect(),
        };
        let (approx, details) = plane.forward();
        assert_eq!((approx.width, approx.height), (4, 3));
        let back = Plane::inverse(&approx, &details, 7, 5);
        for (a, b) in back.data.iter().zip(&plane.data) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_estimate_sigma_tracks_noise_level() {
        // Uniform noise on [-a, a] has sigma a / sqrt(3).
        let values = noisy_plane(128, 128, 0.1, 3);
        let sigma = estimate_sigma(&values, 128, 128);
        assert!(sigma > 0.04 && sigma < 0.075, "sigma = {sigma}");
        assert_eq!(estimate_sigma(&vec![0.5; 64], 8, 8), 0.0);
    }

    #[test]
    fn test_denoise_reduces_noise() {
        let values = noisy_plane(64, 64, 0.1, 11);
        let before = crate::image::mean_std(&values).1;
        let out = denoise_plane(values, 64, 64, 0.0577);
        let after = crate::image::mean_std(&out).1;
        assert!(after < before * 0.7);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_wavelet_denoise_keeps_type() {
        let data: Vec<u16> = noisy_plane(32, 32, 0.05, 5)
            .into_iter()
            .map(|v| (v * 40_000.0) as u16)
            .collect();
        let img = ImageBuffer::from_u16(32, 32, 1, data).unwrap();
        let out = wavelet_denoise(&img, "db1", None).unwrap();
        assert_eq!(out.pixel_type(), PixelType::U16);
        assert_eq!(out.len(), img.len());
        assert!(wavelet_denoise(&img, "coif3", None).is_err());
    }

    #[test]
    fn test_rescale_sigma() {
        assert!((rescale_sigma(655.35, 65535.0) - 0.01).abs() < 1e-6);
        assert_eq!(rescale_sigma(0.2, 0.0), 0.2);
    }
}
