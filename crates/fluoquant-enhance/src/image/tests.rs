use super::*;

fn gradient_u16(width: usize, height: usize) -> ImageBuffer {
    let data = (0..width * height)
        .map(|i| ((i * 977) % 65536) as u16)
        .collect();
    ImageBuffer::from_u16(width, height, 1, data).unwrap()
}

#[test]
fn test_new_rejects_length_mismatch() {
    let err = ImageBuffer::from_u8(4, 4, 1, vec![0; 15]).unwrap_err();
    assert!(matches!(err, EnhanceError::ShapeMismatch { actual: 15, .. }));

    let err = ImageBuffer::from_u8(4, 4, 0, vec![]).unwrap_err();
    assert!(matches!(err, EnhanceError::ShapeMismatch { channels: 0, .. }));
}

#[test]
fn test_unit_range_roundtrip_is_exact_for_integers() {
    let img = gradient_u16(37, 23);
    let (unit, scale) = to_unit_range(&img);
    assert_eq!(scale, 65535.0);
    assert_eq!(unit.pixel_type(), PixelType::F32);
    assert_eq!(from_unit_range(&unit, PixelType::U16, scale), img);

    let data: Vec<u8> = (0..=255).collect();
    let img = ImageBuffer::from_u8(16, 16, 1, data).unwrap();
    let (unit, scale) = to_unit_range(&img);
    assert_eq!(scale, 255.0);
    assert_eq!(from_unit_range(&unit, PixelType::U8, scale), img);
}

#[test]
fn test_unit_range_float_uses_observed_max() {
    let img = ImageBuffer::from_f32(2, 2, 1, vec![0.0, 2.0, 4.0, 8.0]).unwrap();
    let (unit, scale) = to_unit_range(&img);
    assert_eq!(scale, 8.0);
    assert_eq!(unit.data().as_f32().unwrap(), &[0.0, 0.25, 0.5, 1.0]);

    let back = from_unit_range(&unit, PixelType::F32, scale);
    assert_eq!(back, img);
}

#[test]
fn test_unit_range_all_zero_float_does_not_divide_by_zero() {
    let img = ImageBuffer::from_f32(3, 3, 1, vec![0.0; 9]).unwrap();
    let (unit, scale) = to_unit_range(&img);
    assert_eq!(scale, UNIT_EPSILON);
    assert!(unit.to_f32().iter().all(|v| *v == 0.0));
}

#[test]
fn test_from_unit_range_clips_out_of_range_values() {
    let unit = ImageBuffer::from_f32(3, 1, 1, vec![-0.5, 0.5, 1.5]).unwrap();
    let out = from_unit_range(&unit, PixelType::U8, 255.0);
    assert_eq!(out.data().as_u8().unwrap(), &[0, 128, 255]);
}

#[test]
fn test_split_merge_preserves_order() {
    let data: Vec<u8> = (0..24).collect();
    let img = ImageBuffer::from_u8(4, 2, 3, data).unwrap();

    let planes = split_channels(&img);
    assert_eq!(planes.len(), 3);
    assert_eq!(planes[0].data().as_u8().unwrap(), &[0, 3, 6, 9, 12, 15, 18, 21]);
    assert_eq!(planes[2].data().as_u8().unwrap(), &[2, 5, 8, 11, 14, 17, 20, 23]);

    let merged = merge_channels(&planes).unwrap();
    assert_eq!(merged, img);
}

#[test]
fn test_merge_rejects_mixed_types() {
    let a = ImageBuffer::from_u8(2, 2, 1, vec![0; 4]).unwrap();
    let b = ImageBuffer::from_u16(2, 2, 1, vec![0; 4]).unwrap();
    assert!(matches!(
        merge_channels(&[a, b]),
        Err(EnhanceError::ChannelMismatch(_))
    ));
}

#[test]
fn test_map_channels_single_channel_passes_through() {
    let img = gradient_u16(8, 8);
    let mut calls = 0;
    let out = map_channels(&img, |plane| {
        calls += 1;
        assert_eq!(plane, &img);
        Ok(plane.clone())
    })
    .unwrap();
    assert_eq!(calls, 1);
    assert_eq!(out, img);
}

#[test]
fn test_map_channels_applies_per_channel() {
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let img = ImageBuffer::from_f32(2, 2, 3, data).unwrap();
    let mut seen = Vec::new();
    let out = map_channels(&img, |plane| {
        seen.push(plane.to_f32());
        Ok(plane.with_values(plane.to_f32().iter().map(|v| v * 2.0).collect()))
    })
    .unwrap();
    assert_eq!(seen[1], vec![1.0, 4.0, 7.0, 10.0]);
    let expected: Vec<f32> = (0..12).map(|v| v as f32 * 2.0).collect();
    assert_eq!(out.to_f32(), expected);
}

#[test]
fn test_level_scaler_flat_input_maps_back_to_constant() {
    let values = vec![200.0; 16];
    let scaler = LevelScaler::observe(&values).unwrap();
    assert!(scaler.is_flat());

    let scaler = scaler.with_unit_floor();
    let levels = scaler.to_u8_levels(&values);
    assert!(levels.iter().all(|l| *l == 0.0));
    let back = scaler.from_levels(&levels, LevelScaler::U8_LEVELS);
    assert!(back.iter().all(|v| *v == 200.0));
}

#[test]
fn test_level_scaler_u8_levels_truncate() {
    let scaler = LevelScaler::observe(&[0.0, 1000.0]).unwrap();
    let levels = scaler.to_u8_levels(&[0.0, 999.0, 1000.0]);
    assert_eq!(levels, vec![0.0, 254.0, 255.0]);
}

#[test]
fn test_mean_std() {
    let img = ImageBuffer::from_f32(4, 1, 1, vec![2.0, 4.0, 4.0, 6.0]).unwrap();
    let (mean, std) = img.mean_std();
    assert!((mean - 4.0).abs() < 1e-9);
    assert!((std - 2.0f64.sqrt()).abs() < 1e-9);
}
