use super::*;
use crate::config::{PipelineParams, StageDefaults};
use crate::image::PixelType;
use crate::stages::normalize_kernel_size;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noisy_u16(width: usize, height: usize, amplitude: u16, seed: u64) -> ImageBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width * height)
        .map(|_| 10_000 + rng.gen_range(0..=amplitude))
        .collect();
    ImageBuffer::from_u16(width, height, 1, data).unwrap()
}

#[test]
fn test_signal_radius_bounds() {
    assert_eq!(estimate_signal_radius(100, 80), 10);
    assert_eq!(estimate_signal_radius(1000, 1000), 20);
    assert_eq!(estimate_signal_radius(1024, 768), 20);
    assert_eq!(estimate_signal_radius(1275, 10), 26);
    assert_eq!(estimate_signal_radius(10_000, 10_000), 50);
}

#[test]
fn test_signal_radius_is_monotonic() {
    let mut previous = 0;
    for side in (0..5000).step_by(37) {
        let radius = estimate_signal_radius(side, side / 2);
        assert!(radius >= previous);
        assert!((MIN_SIGNAL_RADIUS..=MAX_SIGNAL_RADIUS).contains(&radius));
        previous = radius;
    }
}

#[test]
fn test_flat_image_suggests_minimum_sigma() {
    let img = ImageBuffer::from_u16(300, 200, 1, vec![4000; 60_000]).unwrap();
    let auto = estimate_auto_params(&img);
    assert_eq!(auto.noise_sigma, MIN_NOISE_SIGMA);
    assert_eq!(auto.stretch_clip, 2.0);
    assert_eq!(auto.contrast_clip, 1.5);
    assert_eq!(auto.gamma, 1.0);
    assert_eq!(auto.bg_kernel, 4 * estimate_signal_radius(300, 200));
    assert_eq!(auto.contrast_tile, 2 * estimate_signal_radius(300, 200));
}

#[test]
fn test_noisier_image_suggests_more_smoothing() {
    let quiet = estimate_auto_params(&noisy_u16(64, 64, 20, 1));
    let loud = estimate_auto_params(&noisy_u16(64, 64, 2000, 1));
    assert!(loud.noise_sigma > quiet.noise_sigma);
    assert!(loud.noise_sigma <= MAX_NOISE_SIGMA);
}

#[test]
fn test_empty_image_uses_defaults() {
    let img = ImageBuffer::from_u8(0, 0, 1, Vec::new()).unwrap();
    assert_eq!(estimate_auto_params(&img), AutoParams::default());
    assert_eq!(AutoParams::default().bg_kernel, 40);
}

#[test]
fn test_sigma_mapping_clamps() {
    assert_eq!(noise_sigma_from_residual(0.0, 255.0), 1.0);
    assert!((noise_sigma_from_residual(2.55, 255.0) - 3.0).abs() < 1e-9);
    assert_eq!(noise_sigma_from_residual(100.0, 255.0), 5.0);
}

#[test]
fn test_downsample_limits_longest_side() {
    let img = ImageBuffer::from_u8(1000, 400, 2, vec![7; 800_000]).unwrap();
    let small = downsample_nearest(&img, 256);
    assert_eq!((small.width(), small.height(), small.channels()), (256, 102, 2));
    assert_eq!(small.pixel_type(), PixelType::U8);

    let tiny = ImageBuffer::from_u8(10, 10, 1, vec![1; 100]).unwrap();
    assert_eq!(downsample_nearest(&tiny, 256), tiny);
}

#[test]
fn test_median_residual_even_count_averages() {
    // Only the corner spike leaves a residual.
    let mut data = vec![50u8; 16];
    data[0] = 90;
    let img = ImageBuffer::from_u8(4, 4, 1, data).unwrap();
    assert_eq!(median_residual(&img), 0.0);
}

#[test]
fn test_suggestions_never_enable_stages() {
    let auto = estimate_auto_params(&noisy_u16(40, 40, 500, 2));
    let mut cfg = crate::config::StageConfig::new();
    cfg.merge_auto(&auto);
    let params = PipelineParams::from_config(&cfg, &StageDefaults::default()).unwrap();
    assert!(params.is_noop());
    assert_eq!(cfg.int("bg_kernel", 0).unwrap(), auto.bg_kernel as i64);
}

#[test]
fn test_percents_map_through_auto_values() {
    let auto = AutoParams {
        noise_sigma: 2.0,
        ..AutoParams::default()
    };
    let percents = EnhancePercents {
        stretch: 1.0,
        background: 0.5,
        contrast: 0.5,
        noise: 0.0,
        gamma: 0.5,
    };
    let cfg = percents.to_stage_config(&auto);
    let params = PipelineParams::from_config(&cfg, &StageDefaults::default()).unwrap();

    assert_eq!(params.stretch_clip, Some(2.0));
    let bg = params.background.unwrap();
    assert_eq!(bg.kernel, normalize_kernel_size(auto.bg_kernel));
    assert_eq!(bg.strength, 0.5);
    let contrast = params.contrast.unwrap();
    assert!((contrast.clip_limit - 0.375).abs() < 1e-6);
    assert_eq!(contrast.tile_size, auto.contrast_tile);
    assert_eq!(params.noise_sigma, None);
    assert!((params.gamma.unwrap() - 1.0 / 1.4).abs() < 1e-6);
}

#[test]
fn test_neutral_percents_disable_everything() {
    let cfg = EnhancePercents::default().to_stage_config(&AutoParams::default());
    let params = PipelineParams::from_config(&cfg, &StageDefaults::default()).unwrap();
    assert!(params.is_noop());
}

#[test]
fn test_float_noise_estimate_ignores_absolute_scale() {
    let counts = noisy_u16(64, 64, 400, 3);
    let raw: Vec<f32> = counts.to_f32();
    let peak = raw.iter().copied().fold(0.0f32, f32::max);
    let unit: Vec<f32> = raw.iter().map(|v| v / peak).collect();

    let as_counts = estimate_auto_params(&ImageBuffer::from_f32(64, 64, 1, raw).unwrap());
    let as_unit = estimate_auto_params(&ImageBuffer::from_f32(64, 64, 1, unit).unwrap());
    assert!(as_counts.noise_sigma < MAX_NOISE_SIGMA);
    assert!((as_counts.noise_sigma - as_unit.noise_sigma).abs() < 1e-3);
}
