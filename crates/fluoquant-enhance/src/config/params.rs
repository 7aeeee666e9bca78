//! Typed parameter views parsed from a [`StageConfig`].

use super::{StageConfig, StageDefaults};
use crate::error::EnhanceError;
use crate::stages::normalize_kernel_size;

/// Largest top-hat diameter accepted from configuration.
const MAX_KERNEL: i64 = 1 << 16;

/// Top-hat settings after preview scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundParams {
    pub kernel: usize,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastParams {
    pub clip_limit: f32,
    pub tile_size: usize,
}

/// Full-pipeline settings; `None` means the stage is disabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineParams {
    /// Percent clipped per tail
    pub stretch_clip: Option<f32>,
    pub background: Option<BackgroundParams>,
    pub contrast: Option<ContrastParams>,
    pub noise_sigma: Option<f32>,
    pub gamma: Option<f32>,
}

impl PipelineParams {
    /// Parse the full-pipeline keys. Scalars of disabled stages are not read.
    pub fn from_config(cfg: &StageConfig, defaults: &StageDefaults) -> Result<Self, EnhanceError> {
        let mut params = PipelineParams::default();

        if cfg.flag("stretch_enabled", false)? {
            params.stretch_clip = Some(cfg.float("stretch_clip", defaults.stretch_clip)? as f32);
        }

        if cfg.flag("bg_enabled", false)? {
            let mut kernel = cfg.int("bg_kernel", defaults.bg_kernel)?;
            let strength = cfg.float("bg_strength", defaults.bg_strength)?;
            let scale = cfg.float("scale_factor", defaults.scale_factor)?;
            if scale > 0.0 && scale < 1.0 && kernel > 0 {
                kernel = (kernel as f64 * scale).trunc() as i64;
            }
            // Non-positive sizes fall back to the smallest element.
            let kernel = normalize_kernel_size(kernel.clamp(0, MAX_KERNEL) as usize);
            params.background = Some(BackgroundParams {
                kernel,
                strength: strength as f32,
            });
        }

        if cfg.flag("contrast_enabled", false)? {
            let clip_limit = cfg.float("contrast_clip", defaults.contrast_clip)?;
            let tile_size = cfg.int("contrast_tile", defaults.contrast_tile)?.max(2);
            params.contrast = Some(ContrastParams {
                clip_limit: clip_limit as f32,
                tile_size: tile_size as usize,
            });
        }

        if cfg.flag("noise_enabled", false)? {
            params.noise_sigma = Some(cfg.float("noise_sigma", defaults.noise_sigma)? as f32);
        }

        if cfg.flag("gamma_enabled", false)? {
            params.gamma = Some(cfg.float("gamma", defaults.gamma)? as f32);
        }

        Ok(params)
    }

    /// True when no stage is enabled.
    pub fn is_noop(&self) -> bool {
        self.stretch_clip.is_none()
            && self.background.is_none()
            && self.contrast.is_none()
            && self.noise_sigma.is_none()
            && self.gamma.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    pub diameter: i32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveletParams {
    pub base: String,
    pub auto_sigma: bool,
    /// Fixed noise level in source units, used when `auto_sigma` is off
    pub sigma: Option<f32>,
}

/// Realtime preview settings; `None` means the stage is disabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeParams {
    /// `(low, high)` percentiles
    pub stretch: Option<(f32, f32)>,
    pub bilateral: Option<BilateralParams>,
    pub wavelet: Option<WaveletParams>,
}

impl RealtimeParams {
    pub fn from_config(cfg: &StageConfig, defaults: &StageDefaults) -> Result<Self, EnhanceError> {
        let mut params = RealtimeParams::default();

        if cfg.flag("percentile_stretch", false)? {
            let low = cfg.float("lower_percentile", defaults.lower_percentile)?;
            let high = cfg.float("upper_percentile", defaults.upper_percentile)?;
            params.stretch = Some((low as f32, high as f32));
        }

        if cfg.flag("bilateral_filter", false)? {
            let diameter = cfg.int("bilateral_d", defaults.bilateral_d)?;
            let sigma_color = cfg.float("bilateral_sigma_color", defaults.bilateral_sigma_color)?;
            let sigma_space = cfg.float("bilateral_sigma_space", defaults.bilateral_sigma_space)?;
            params.bilateral = Some(BilateralParams {
                diameter: diameter.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                sigma_color: sigma_color as f32,
                sigma_space: sigma_space as f32,
            });
        }

        if cfg.flag("wavelet_denoise", false)? {
            let mut base = cfg.text("wavelet_base", &defaults.wavelet_base)?;
            if base.trim().is_empty() {
                base = defaults.wavelet_base.clone();
            }
            let sigma = if cfg.contains_key("wavelet_sigma") {
                Some(cfg.float("wavelet_sigma", 0.0)? as f32)
            } else {
                None
            };
            params.wavelet = Some(WaveletParams {
                base,
                auto_sigma: cfg.flag("auto_sigma", false)?,
                sigma,
            });
        }

        Ok(params)
    }
}
