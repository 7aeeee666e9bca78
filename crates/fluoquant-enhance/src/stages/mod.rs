//! Enhancement stages
//!
//! Every stage is a pure function of (buffer, parameters) returning a new
//! buffer of the same shape and element type. Multi-channel input is handled
//! per channel.
//!
//! This module is organized into submodules:
//! - `stretch`: percentile-anchored intensity stretch
//! - `background`: white top-hat background suppression and blending
//! - `contrast`: tiled, contrast-limited histogram equalization
//! - `bilateral`: edge-preserving smoothing
//! - `nlm`: non-local-means denoising
//! - `wavelet`: BayesShrink wavelet denoising (feature `wavelet`)
//! - `deconvolution`: Richardson-Lucy with optional TV regularization
//! - `gamma`: power-law mapping
//! - `median`: square median filter
//! - `morphology`: structuring elements, erosion, dilation, opening

mod background;
mod bilateral;
mod border;
mod contrast;
mod deconvolution;
mod gamma;
mod median;
mod morphology;
mod nlm;
mod stretch;
#[cfg(feature = "wavelet")]
mod wavelet;

pub use background::{
    background_suppression, blend_background, top_hat_with, FULL_STRENGTH_TOLERANCE,
};
pub use bilateral::{bilateral_filter, bilateral_levels, noise_smoothing, noise_smoothing_params};
pub use contrast::{clahe_levels, local_contrast, TileLuts, CLIP_SCALE_U16, CLIP_SCALE_U8};
pub use deconvolution::{convolve_same, richardson_lucy, tv_chambolle, Psf, DEFAULT_ITERATIONS};
pub use gamma::{apply_gamma, display_gamma};
pub use median::median_filter;
pub use morphology::{dilate, erode, normalize_kernel_size, opening, top_hat, StructuringElement};
pub use nlm::{nlm_denoise, DEFAULT_H as DEFAULT_NLM_H};
pub use stretch::{percentile_stretch, percentiles};
#[cfg(feature = "wavelet")]
pub use wavelet::{estimate_sigma, rescale_sigma, wavelet_denoise, wavelet_levels, WaveletBase};

#[cfg(feature = "gpu")]
pub(crate) use bilateral::BilateralKernel;
pub(crate) use median::median_plane;

use crate::accel::Acceleration;
use crate::error::EnhanceError;
use crate::image::ImageBuffer;

/// One configured step of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Percentile window mapped onto the channel's own range
    Stretch { low: f32, high: f32 },

    /// Top-hat suppression blended back by `strength`
    Background { kernel: usize, strength: f32 },

    /// Tiled equalization; `tile_size` tiles per axis
    Contrast { clip_limit: f32, tile_size: usize },

    /// Bilateral smoothing driven by one sigma
    NoiseSmoothing { sigma: f32 },

    /// Bilateral smoothing with explicit parameters
    Bilateral {
        diameter: i32,
        sigma_color: f32,
        sigma_space: f32,
    },

    /// Final power-law mapping
    DisplayGamma { gamma: f32 },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Stretch { .. } => "stretch",
            Stage::Background { .. } => "background",
            Stage::Contrast { .. } => "contrast",
            Stage::NoiseSmoothing { .. } => "noise",
            Stage::Bilateral { .. } => "bilateral",
            Stage::DisplayGamma { .. } => "gamma",
        }
    }

    pub fn apply(
        &self,
        image: &ImageBuffer,
        accel: Acceleration<'_>,
    ) -> Result<ImageBuffer, EnhanceError> {
        match *self {
            Stage::Stretch { low, high } => percentile_stretch(image, low, high),
            Stage::Background { kernel, strength } => {
                let suppressed = background_suppression(image, kernel, accel)?;
                blend_background(image, suppressed, strength)
            }
            Stage::Contrast {
                clip_limit,
                tile_size,
            } => local_contrast(image, clip_limit, tile_size, accel),
            Stage::NoiseSmoothing { sigma } => noise_smoothing(image, sigma, accel),
            Stage::Bilateral {
                diameter,
                sigma_color,
                sigma_space,
            } => bilateral_filter(image, diameter, sigma_color, sigma_space, accel),
            Stage::DisplayGamma { gamma } => Ok(display_gamma(image, gamma)),
        }
    }
}
