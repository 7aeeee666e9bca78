//! Low-latency preview pipeline.
//!
//! Runs per channel: percentile stretch, bilateral filter, then wavelet
//! denoising. A failed wavelet pass falls back to noise smoothing at sigma 1.

use crate::accel::Acceleration;
use crate::config::{RealtimeParams, StageConfig, StageDefaults, WaveletParams};
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer};
use crate::stages::{bilateral_filter, percentile_stretch};

/// Sigma used when wavelet denoising cannot run.
#[cfg(feature = "wavelet")]
const WAVELET_FALLBACK_SIGMA: f32 = 1.0;

/// Run the preview stages on every channel.
///
/// Always returns a new buffer, even when nothing is enabled.
pub fn process_realtime(
    image: &ImageBuffer,
    cfg: &StageConfig,
    defaults: &StageDefaults,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    let params = RealtimeParams::from_config(cfg, defaults)?;
    map_channels(image, |plane| process_plane(plane, &params, accel))
}

fn process_plane(
    plane: &ImageBuffer,
    params: &RealtimeParams,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    let mut result = plane.clone();

    if let Some((low, high)) = params.stretch {
        result = percentile_stretch(&result, low, high)?;
    }

    if let Some(b) = params.bilateral {
        result = bilateral_filter(&result, b.diameter, b.sigma_color, b.sigma_space, accel)?;
    }

    if let Some(wavelet) = &params.wavelet {
        result = wavelet_or_smooth(result, wavelet, accel)?;
    }

    Ok(result)
}

#[cfg(feature = "wavelet")]
fn wavelet_or_smooth(
    image: ImageBuffer,
    params: &WaveletParams,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    use crate::image::to_unit_range;
    use crate::stages::{estimate_sigma, rescale_sigma, wavelet_denoise};

    let sigma = if params.auto_sigma {
        let (unit, _) = to_unit_range(&image);
        Some(estimate_sigma(&unit.to_f32(), image.width(), image.height()))
    } else if let Some(sigma) = params.sigma {
        let (_, scale) = to_unit_range(&image);
        Some(rescale_sigma(sigma, scale))
    } else {
        None
    };

    match wavelet_denoise(&image, &params.base, sigma) {
        Ok(denoised) => Ok(denoised),
        Err(err) => {
            tracing::warn!(
                base = %params.base,
                error = %err,
                "wavelet denoising failed, smoothing instead"
            );
            crate::stages::noise_smoothing(&image, WAVELET_FALLBACK_SIGMA, accel)
        }
    }
}

#[cfg(not(feature = "wavelet"))]
fn wavelet_or_smooth(
    image: ImageBuffer,
    params: &WaveletParams,
    _accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    tracing::debug!(base = %params.base, "wavelet support not compiled in, skipping");
    Ok(image)
}
