//! Richardson-Lucy deconvolution with optional total-variation cleanup.

use crate::error::EnhanceError;
use crate::image::{from_unit_range, merge_channels, split_channels, to_unit_range, ImageBuffer};
use crate::parallel::for_each_row_mut;

pub const DEFAULT_ITERATIONS: usize = 10;
/// Initial estimate for every pixel.
const START_VALUE: f32 = 0.5;
/// Guards the ratio against division by zero.
const RATIO_EPSILON: f32 = 1e-12;
pub const TV_WEIGHT: f32 = 0.02;
const TV_EPSILON: f64 = 2e-4;
const TV_MAX_ITERATIONS: usize = 200;

/// Point-spread function: a non-negative kernel of any size.
#[derive(Debug, Clone, PartialEq)]
pub struct Psf {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Psf {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, EnhanceError> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(EnhanceError::InvalidKernel(format!(
                "psf of {width}x{height} needs {} values, got {}",
                width * height,
                data.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(EnhanceError::InvalidKernel(
                "psf values must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Normalized square Gaussian of side `size`.
    pub fn gaussian(size: usize, sigma: f32) -> Result<Self, EnhanceError> {
        if size == 0 || !(sigma > 0.0) || !sigma.is_finite() {
            return Err(EnhanceError::InvalidKernel(format!(
                "gaussian psf needs size >= 1 and sigma > 0, got {size} and {sigma}"
            )));
        }
        let center = (size as f64 - 1.0) / 2.0;
        let coeff = -0.5 / (sigma as f64 * sigma as f64);
        let profile: Vec<f64> = (0..size)
            .map(|i| ((i as f64 - center).powi(2) * coeff).exp())
            .collect();
        let total: f64 = profile.iter().sum::<f64>().powi(2);
        let data = (0..size * size)
            .map(|i| (profile[i / size] * profile[i % size] / total) as f32)
            .collect();
        Self::new(size, size, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The kernel rotated by 180 degrees.
    pub fn mirrored(&self) -> Psf {
        Psf {
            width: self.width,
            height: self.height,
            data: self.data.iter().rev().copied().collect(),
        }
    }
}

/// Deconvolve every channel against `psf`.
///
/// Without a PSF the input is returned unchanged. The image is brought to the
/// unit range once, each channel runs `max(1, iterations)` updates and the
/// optional TV pass, and the result is clipped and scaled back.
pub fn richardson_lucy(
    image: &ImageBuffer,
    psf: Option<&Psf>,
    iterations: usize,
    tv_reg: bool,
) -> Result<ImageBuffer, EnhanceError> {
    let Some(psf) = psf else {
        return Ok(image.clone());
    };
    if image.is_empty() {
        return Ok(image.clone());
    }
    let (width, height) = (image.width(), image.height());
    let iterations = iterations.max(1);
    let (unit, scale) = to_unit_range(image);

    let mut planes = Vec::with_capacity(image.channels());
    for plane in split_channels(&unit) {
        let mut restored = richardson_lucy_plane(&plane.to_f32(), width, height, psf, iterations);
        if tv_reg {
            restored = tv_chambolle(&restored, width, height, TV_WEIGHT);
        }
        planes.push(plane.with_f32(restored));
    }
    let merged = merge_channels(&planes)?;
    tracing::trace!(iterations, tv_reg, "richardson-lucy finished");
    Ok(from_unit_range(&merged, image.pixel_type(), scale))
}

/// Richardson-Lucy updates on one unit-range plane.
pub fn richardson_lucy_plane(
    observed: &[f32],
    width: usize,
    height: usize,
    psf: &Psf,
    iterations: usize,
) -> Vec<f32> {
    let mirror = psf.mirrored();
    let mut estimate = vec![START_VALUE; observed.len()];
    for _ in 0..iterations {
        let blurred = convolve_same(&estimate, width, height, psf);
        let ratio: Vec<f32> = observed
            .iter()
            .zip(&blurred)
            .map(|(o, b)| o / (b + RATIO_EPSILON))
            .collect();
        let correction = convolve_same(&ratio, width, height, &mirror);
        for (e, c) in estimate.iter_mut().zip(&correction) {
            *e *= c;
        }
    }
    estimate
}

/// Zero-padded convolution cropped to the input size, centred on the
/// kernel's `(size - 1) / 2` element.
pub fn convolve_same(src: &[f32], width: usize, height: usize, kernel: &Psf) -> Vec<f32> {
    let mut out = vec![0.0f32; src.len()];
    if src.is_empty() {
        return out;
    }
    let oy = ((kernel.height - 1) / 2) as isize;
    let ox = ((kernel.width - 1) / 2) as isize;

    for_each_row_mut(&mut out, width, |y, row| {
        for (ky, krow) in kernel.data.chunks(kernel.width).enumerate() {
            let sy = y as isize + oy - ky as isize;
            if sy < 0 || sy >= height as isize {
                continue;
            }
            let src_row = &src[sy as usize * width..(sy as usize + 1) * width];
            for (kx, &k) in krow.iter().enumerate() {
                if k == 0.0 {
                    continue;
                }
                let shift = ox - kx as isize;
                let x_start = (-shift).max(0) as usize;
                let x_end = (width as isize - shift).clamp(0, width as isize) as usize;
                for x in x_start..x_end {
                    row[x] += k * src_row[(x as isize + shift) as usize];
                }
            }
        }
    });
    out
}

/// Total-variation denoising by Chambolle's projection algorithm.
pub fn tv_chambolle(image: &[f32], width: usize, height: usize, weight: f32) -> Vec<f32> {
    let n = image.len();
    if n == 0 || weight <= 0.0 {
        return image.to_vec();
    }
    let tau = 0.25f32;
    let scale = tau / weight;

    // Dual field, one component per axis (y then x).
    let mut py = vec![0.0f32; n];
    let mut px = vec![0.0f32; n];
    let mut gy = vec![0.0f32; n];
    let mut gx = vec![0.0f32; n];
    let mut d = vec![0.0f32; n];
    let mut out = image.to_vec();
    let mut energy_init = 0.0f64;
    let mut energy_prev = 0.0f64;

    for i in 0..TV_MAX_ITERATIONS {
        if i > 0 {
            for idx in 0..n {
                let (y, x) = (idx / width, idx % width);
                let mut v = -(py[idx] + px[idx]);
                if y > 0 {
                    v += py[idx - width];
                }
                if x > 0 {
                    v += px[idx - 1];
                }
                d[idx] = v;
                out[idx] = image[idx] + v;
            }
        }
        let mut energy: f64 = d.iter().map(|v| (*v as f64).powi(2)).sum();

        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                if y + 1 < height {
                    gy[idx] = out[idx + width] - out[idx];
                }
                if x + 1 < width {
                    gx[idx] = out[idx + 1] - out[idx];
                }
            }
        }

        for idx in 0..n {
            let norm = (gy[idx] * gy[idx] + gx[idx] * gx[idx]).sqrt();
            energy += weight as f64 * norm as f64;
            let denom = 1.0 + norm * scale;
            py[idx] = (py[idx] - tau * gy[idx]) / denom;
            px[idx] = (px[idx] - tau * gx[idx]) / denom;
        }

        energy /= n as f64;
        if i == 0 {
            energy_init = energy;
            energy_prev = energy;
        } else if (energy_prev - energy).abs() < TV_EPSILON * energy_init {
            break;
        } else {
            energy_prev = energy;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelType;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn point_source(size: usize) -> Vec<f32> {
        let mut v = vec![0.05f32; size * size];
        v[(size / 2) * size + size / 2] = 1.0;
        v
    }

    #[test]
    fn test_missing_psf_returns_copy() {
        let img = ImageBuffer::from_u16(4, 4, 1, (0..16).map(|v| v * 100).collect()).unwrap();
        assert_eq!(richardson_lucy(&img, None, 10, true).unwrap(), img);
    }

    #[test]
    fn test_delta_psf_recovers_input() {
        let img = ImageBuffer::from_u8(5, 4, 1, (0..20).map(|v| v * 12).collect()).unwrap();
        let delta = Psf::new(1, 1, vec![1.0]).unwrap();
        assert_eq!(richardson_lucy(&img, Some(&delta), 3, false).unwrap(), img);
    }

    #[test]
    fn test_deconvolution_sharpens_blurred_point() {
        let size = 21;
        let psf = Psf::gaussian(7, 1.5).unwrap();
        let blurred = convolve_same(&point_source(size), size, size, &psf);
        let centre = (size / 2) * size + size / 2;

        let restored = richardson_lucy_plane(&blurred, size, size, &psf, 20);
        assert!(restored[centre] > blurred[centre] * 1.5);
    }

    #[test]
    fn test_convolve_same_centres_odd_kernel() {
        let kernel = Psf::new(3, 1, vec![0.0, 0.0, 1.0]).unwrap();
        let out = convolve_same(&[1.0, 2.0, 3.0, 4.0], 4, 1, &kernel);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_gaussian_psf_is_normalized_and_symmetric() {
        let psf = Psf::gaussian(5, 1.0).unwrap();
        let total: f32 = psf.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(psf.mirrored(), psf);
        assert!(Psf::gaussian(0, 1.0).is_err());
        assert!(Psf::gaussian(3, 0.0).is_err());
        assert!(Psf::new(2, 2, vec![1.0, -1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_tv_flattens_noise_and_keeps_constants() {
        let flat = vec![0.4f32; 100];
        assert_eq!(tv_chambolle(&flat, 10, 10, TV_WEIGHT), flat);

        let mut rng = StdRng::seed_from_u64(9);
        let noisy: Vec<f32> = (0..32 * 32).map(|_| 0.5 + rng.gen_range(-0.05..0.05)).collect();
        let out = tv_chambolle(&noisy, 32, 32, TV_WEIGHT);
        assert!(crate::image::mean_std(&out).1 < crate::image::mean_std(&noisy).1);
    }

    #[test]
    fn test_multichannel_keeps_layout_and_type() {
        let data: Vec<u16> = (0..2 * 6 * 6).map(|v| (v * 300) as u16).collect();
        let img = ImageBuffer::from_u16(6, 6, 2, data).unwrap();
        let psf = Psf::gaussian(3, 0.8).unwrap();
        let out = richardson_lucy(&img, Some(&psf), 2, true).unwrap();
        assert_eq!(out.channels(), 2);
        assert_eq!(out.pixel_type(), PixelType::U16);
    }
}
