//! Slider percentages to stage parameters.

use serde::{Deserialize, Serialize};

use super::AutoParams;
use crate::config::StageConfig;

/// Gamma change per unit of the gamma slider.
pub const GAMMA_SENSITIVITY: f64 = 0.8;

/// Per-stage slider positions as fractions (`1.0` = the auto suggestion).
///
/// `gamma` is signed: negative darkens, positive brightens, `0.0` is
/// neutral.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancePercents {
    pub stretch: f64,
    pub background: f64,
    pub contrast: f64,
    pub noise: f64,
    pub gamma: f64,
}

impl EnhancePercents {
    /// Scale the auto suggestions and enable each stage only when its value
    /// clears a small threshold.
    ///
    /// Contrast scales with the square of its slider for finer control near
    /// zero; gamma maps to `1 / (1 + 0.8 p)`.
    pub fn to_stage_config(&self, auto: &AutoParams) -> StageConfig {
        let stretch_clip = (auto.stretch_clip * self.stretch).max(0.0);
        let bg_strength = self.background;
        let contrast_clip = auto.contrast_clip * self.contrast.powi(2);
        let noise_sigma = auto.noise_sigma * self.noise;
        let gamma = 1.0 / (1.0 + self.gamma.max(-1.0) * GAMMA_SENSITIVITY);

        StageConfig::new()
            .with("stretch_enabled", stretch_clip > 0.001)
            .with("stretch_clip", stretch_clip)
            .with("bg_enabled", bg_strength > 0.001)
            .with("bg_kernel", auto.bg_kernel)
            .with("bg_strength", bg_strength)
            .with("contrast_enabled", contrast_clip > 0.001)
            .with("contrast_clip", contrast_clip)
            .with("contrast_tile", auto.contrast_tile)
            .with("noise_enabled", noise_sigma > 0.01)
            .with("noise_sigma", noise_sigma)
            .with("gamma_enabled", (gamma - 1.0).abs() > 0.001)
            .with("gamma", gamma)
    }
}
