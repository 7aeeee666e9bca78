//! Default stage parameter values and the optional YAML defaults file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::StageConfig;
use crate::error::EnhanceError;

/// Candidate file names searched for on disk.
const CONFIG_FILENAMES: &[&str] = &["enhance.yml", "enhance.yaml"];

/// Environment variable naming an explicit defaults file.
pub const CONFIG_ENV_VAR: &str = "FLUOQUANT_ENHANCE_CONFIG";

/// Fallback values used for any key a [`StageConfig`] does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageDefaults {
    /// Percent clipped from each tail by the full-pipeline stretch
    pub stretch_clip: f64,
    /// Top-hat structuring element diameter in pixels
    pub bg_kernel: i64,
    /// Blend between original (0) and background-suppressed (1)
    pub bg_strength: f64,
    pub contrast_clip: f64,
    /// Tiles per axis for local contrast
    pub contrast_tile: i64,
    pub noise_sigma: f64,
    pub gamma: f64,
    /// Preview downscale applied to `bg_kernel`
    pub scale_factor: f64,

    // Realtime preview
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub bilateral_d: i64,
    pub bilateral_sigma_color: f64,
    pub bilateral_sigma_space: f64,
    pub wavelet_base: String,

    // Standalone restoration stages
    pub nlm_h: f64,
    pub deconv_iterations: i64,
}

impl Default for StageDefaults {
    fn default() -> Self {
        Self {
            stretch_clip: 2.0,
            bg_kernel: 50,
            bg_strength: 1.0,
            contrast_clip: 1.5,
            contrast_tile: 8,
            noise_sigma: 1.0,
            gamma: 1.0,
            scale_factor: 1.0,
            lower_percentile: 2.0,
            upper_percentile: 98.0,
            bilateral_d: 7,
            bilateral_sigma_color: 50.0,
            bilateral_sigma_space: 50.0,
            wavelet_base: "db1".to_string(),
            nlm_h: 10.0,
            deconv_iterations: 10,
        }
    }
}

impl StageDefaults {
    /// Clamp every field into the range its stage accepts.
    pub fn sanitize(&mut self) {
        let fallback = Self::default();

        self.stretch_clip = finite_or(self.stretch_clip, fallback.stretch_clip).clamp(0.0, 50.0);
        self.bg_kernel = self.bg_kernel.max(0);
        self.bg_strength = finite_or(self.bg_strength, fallback.bg_strength).clamp(0.0, 1.0);
        self.contrast_clip = finite_or(self.contrast_clip, fallback.contrast_clip).max(0.0);
        self.contrast_tile = self.contrast_tile.max(2);
        self.noise_sigma = finite_or(self.noise_sigma, fallback.noise_sigma).max(0.0);
        self.gamma = finite_or(self.gamma, fallback.gamma);
        if self.gamma <= 0.0 {
            self.gamma = fallback.gamma;
        }
        self.scale_factor = finite_or(self.scale_factor, fallback.scale_factor);
        if self.scale_factor <= 0.0 {
            self.scale_factor = fallback.scale_factor;
        }
        self.lower_percentile =
            finite_or(self.lower_percentile, fallback.lower_percentile).clamp(0.0, 100.0);
        self.upper_percentile =
            finite_or(self.upper_percentile, fallback.upper_percentile).clamp(0.0, 100.0);
        self.bilateral_d = self.bilateral_d.max(1);
        self.bilateral_sigma_color =
            finite_or(self.bilateral_sigma_color, fallback.bilateral_sigma_color).max(0.0);
        self.bilateral_sigma_space =
            finite_or(self.bilateral_sigma_space, fallback.bilateral_sigma_space).max(0.0);
        if self.wavelet_base.trim().is_empty() {
            self.wavelet_base = fallback.wavelet_base;
        }
        self.nlm_h = finite_or(self.nlm_h, fallback.nlm_h).max(0.0);
        self.deconv_iterations = self.deconv_iterations.max(1);
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Complete defaults file structure.
///
/// ```yaml
/// defaults:
///   bg_kernel: 40
///   contrast_tile: 6
/// preset:
///   stretch_enabled: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub defaults: StageDefaults,
    /// Stage configuration a host can start from before applying user edits
    pub preset: StageConfig,
}

impl EnhanceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<EnhanceConfig>(yaml).map(Self::sanitize)
    }

    /// Read and parse a single file.
    pub fn from_path(path: &Path) -> Result<Self, EnhanceError> {
        let contents = fs::read_to_string(path).map_err(|e| EnhanceError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&contents).map_err(|e| EnhanceError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn sanitize(mut self) -> Self {
        self.defaults.sanitize();
        self
    }
}

/// Loaded configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct EnhanceConfigHandle {
    pub config: EnhanceConfig,
    pub source: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl EnhanceConfigHandle {
    fn with_config(config: EnhanceConfig, source: Option<PathBuf>, warnings: Vec<String>) -> Self {
        Self {
            config,
            source,
            warnings,
        }
    }

    /// Emit the config source and any warnings through `tracing`.
    pub fn log_usage(&self) {
        match &self.source {
            Some(source) => tracing::info!(path = %source.display(), "loaded enhance config"),
            None => tracing::info!("using built-in enhance defaults"),
        }
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }
}

/// Load stage defaults from disk, optionally forcing a specific path.
///
/// Search order: `custom_path`, `$FLUOQUANT_ENHANCE_CONFIG`, `./config/<name>`,
/// `./<name>`, then `~/fluoquant/<name>`. Unreadable or malformed candidates
/// are recorded as warnings and skipped; with no usable file the built-in
/// defaults are returned.
pub fn load_enhance_config(custom_path: Option<&Path>) -> EnhanceConfigHandle {
    let mut warnings = Vec::new();

    for candidate in config_candidates(custom_path) {
        if !candidate.is_file() {
            continue;
        }
        match EnhanceConfig::from_path(&candidate) {
            Ok(config) => {
                let source = fs::canonicalize(&candidate).unwrap_or(candidate);
                return EnhanceConfigHandle::with_config(config, Some(source), warnings);
            }
            Err(err) => warnings.push(err.to_string()),
        }
    }

    warnings.push("No enhance config found; using built-in defaults.".to_string());
    EnhanceConfigHandle::with_config(EnhanceConfig::default(), None, warnings)
}

fn config_candidates(custom_path: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = custom_path {
        candidates.push(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        candidates.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        for name in CONFIG_FILENAMES {
            candidates.push(cwd.join("config").join(name));
            candidates.push(cwd.join(name));
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        for name in CONFIG_FILENAMES {
            candidates.push(home_dir.join("fluoquant").join(name));
        }
    }

    candidates
}
