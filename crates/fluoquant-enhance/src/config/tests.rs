use super::*;
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn temp_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("enhance.yml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_yaml_values_keep_their_kind() {
    let cfg = StageConfig::from_yaml_str(
        "stretch_enabled: true\nstretch_clip: 2.5\nbg_kernel: 41\nwavelet_base: db1\n",
    )
    .unwrap();
    assert_eq!(cfg.get("stretch_enabled"), Some(&ParamValue::Bool(true)));
    assert_eq!(cfg.get("stretch_clip"), Some(&ParamValue::Float(2.5)));
    assert_eq!(cfg.get("bg_kernel"), Some(&ParamValue::Int(41)));
    assert_eq!(cfg.get("wavelet_base"), Some(&ParamValue::Text("db1".into())));
}

#[test]
fn test_accessors_coerce_compatible_values() {
    let cfg = StageConfig::new()
        .with("a", 3)
        .with("b", 2.9)
        .with("c", " 4.5 ")
        .with("d", "true")
        .with("e", 0);

    assert_eq!(cfg.float("a", 0.0).unwrap(), 3.0);
    assert_eq!(cfg.int("b", 0).unwrap(), 2);
    assert_eq!(cfg.float("c", 0.0).unwrap(), 4.5);
    assert!(cfg.flag("d", false).unwrap());
    assert!(!cfg.flag("e", true).unwrap());
    assert_eq!(cfg.float("missing", 1.25).unwrap(), 1.25);
    assert_eq!(cfg.text("missing", "db1").unwrap(), "db1");
}

#[test]
fn test_accessors_reject_malformed_values() {
    let cfg = StageConfig::new()
        .with("kernel", "wide")
        .with("flag", "sometimes")
        .with("clip", true)
        .with("nan", f64::NAN)
        .with("base", 4);

    assert!(matches!(
        cfg.int("kernel", 0),
        Err(EnhanceError::InvalidParameter { .. })
    ));
    assert!(cfg.flag("flag", false).is_err());
    assert!(cfg.float("clip", 0.0).is_err());
    assert!(cfg.float("nan", 0.0).is_err());
    assert!(cfg.text("base", "db1").is_err());
}

#[test]
fn test_merge_auto_leaves_flags_alone() {
    let auto = crate::auto_adjust::AutoParams::default();
    let mut cfg = StageConfig::new().with("noise_enabled", false);
    cfg.merge_auto(&auto);

    assert_eq!(cfg.get("noise_enabled"), Some(&ParamValue::Bool(false)));
    assert!(!cfg.contains_key("bg_enabled"));
    assert_eq!(cfg.int("contrast_tile", 0).unwrap(), auto.contrast_tile as i64);
    assert_eq!(cfg.float("gamma", 0.0).unwrap(), 1.0);
}

#[test]
fn test_pipeline_params_fall_back_to_defaults() {
    let defaults = StageDefaults {
        bg_kernel: 31,
        contrast_tile: 6,
        ..StageDefaults::default()
    };
    let cfg = StageConfig::new()
        .with("bg_enabled", true)
        .with("contrast_enabled", 1);
    let params = PipelineParams::from_config(&cfg, &defaults).unwrap();
    assert_eq!(
        params.background,
        Some(BackgroundParams {
            kernel: 31,
            strength: 1.0
        })
    );
    assert_eq!(params.contrast.map(|c| c.tile_size), Some(6));
    assert!(params.stretch_clip.is_none());
}

#[test]
fn test_non_positive_background_kernel_uses_smallest_element() {
    for kernel in [0, -8] {
        let cfg = StageConfig::new()
            .with("bg_enabled", true)
            .with("bg_kernel", kernel);
        let params = PipelineParams::from_config(&cfg, &StageDefaults::default()).unwrap();
        assert_eq!(params.background.map(|bg| bg.kernel), Some(3));
    }
}

#[test]
fn test_realtime_params() {
    let cfg = StageConfig::new()
        .with("percentile_stretch", true)
        .with("lower_percentile", 1)
        .with("bilateral_filter", true)
        .with("bilateral_d", 9.0)
        .with("wavelet_denoise", true)
        .with("wavelet_base", "  ");
    let params = RealtimeParams::from_config(&cfg, &StageDefaults::default()).unwrap();
    assert_eq!(params.stretch, Some((1.0, 98.0)));
    assert_eq!(
        params.bilateral,
        Some(BilateralParams {
            diameter: 9,
            sigma_color: 50.0,
            sigma_space: 50.0
        })
    );
    let wavelet = params.wavelet.unwrap();
    assert_eq!(wavelet.base, "db1");
    assert!(!wavelet.auto_sigma);
    assert_eq!(wavelet.sigma, None);
}

#[test]
fn test_defaults_sanitize() {
    let mut defaults = StageDefaults {
        stretch_clip: f64::NAN,
        bg_strength: 3.0,
        contrast_tile: 0,
        gamma: -1.0,
        wavelet_base: String::new(),
        deconv_iterations: 0,
        ..StageDefaults::default()
    };
    defaults.sanitize();
    assert_eq!(defaults.stretch_clip, 2.0);
    assert_eq!(defaults.bg_strength, 1.0);
    assert_eq!(defaults.contrast_tile, 2);
    assert_eq!(defaults.gamma, 1.0);
    assert_eq!(defaults.wavelet_base, "db1");
    assert_eq!(defaults.deconv_iterations, 1);
}

#[test]
fn test_enhance_config_from_yaml() {
    let config = EnhanceConfig::from_yaml_str(
        "defaults:\n  bg_kernel: 40\n  contrast_tile: 0\npreset:\n  stretch_enabled: true\n",
    )
    .unwrap();
    assert_eq!(config.defaults.bg_kernel, 40);
    assert_eq!(config.defaults.contrast_tile, 2);
    assert_eq!(config.defaults.gamma, 1.0);
    assert!(config.preset.flag("stretch_enabled", false).unwrap());
}

#[test]
fn test_load_from_custom_path() {
    let (_dir, path) = temp_config("defaults:\n  noise_sigma: 2.5\n");
    let handle = load_enhance_config(Some(&path));
    assert_eq!(handle.config.defaults.noise_sigma, 2.5);
    assert!(handle.source.is_some());
    assert!(handle.warnings.is_empty());
}

#[test]
fn test_malformed_file_is_reported_and_skipped() {
    let (_dir, path) = temp_config("defaults: [not, a, mapping]\n");
    let handle = load_enhance_config(Some(&path));
    assert!(handle
        .warnings
        .iter()
        .any(|w| w.contains(&*path.to_string_lossy())));
}
