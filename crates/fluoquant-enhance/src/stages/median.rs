//! Square-window median filter.

use super::border::replicate;
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer};
use crate::parallel::for_each_row_mut;

/// Median of each `ksize x ksize` neighbourhood, per channel.
///
/// `ksize` is forced odd and at least 3; borders replicate the edge pixel.
pub fn median_filter(image: &ImageBuffer, ksize: usize) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let ksize = (ksize | 1).max(3);
    let (width, height) = (image.width(), image.height());
    map_channels(image, |plane| {
        let values = plane.to_f32();
        Ok(plane.with_values(median_plane(&values, width, height, ksize)))
    })
}

pub fn median_plane(values: &[f32], width: usize, height: usize, ksize: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    if values.is_empty() {
        return out;
    }
    let r = (ksize / 2) as isize;

    for_each_row_mut(&mut out, width, |y, row| {
        let mut window = Vec::with_capacity(ksize * ksize);
        for (x, out_v) in row.iter_mut().enumerate() {
            window.clear();
            for dy in -r..=r {
                let sy = replicate(y as isize + dy, height);
                for dx in -r..=r {
                    let sx = replicate(x as isize + dx, width);
                    window.push(values[sy * width + sx]);
                }
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
            *out_v = *median;
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_isolated_spike() {
        let mut data = vec![10u8; 25];
        data[12] = 250;
        let img = ImageBuffer::from_u8(5, 5, 1, data).unwrap();
        let out = median_filter(&img, 3).unwrap();
        assert!(out.data().as_u8().unwrap().iter().all(|&v| v == 10));
    }

    #[test]
    fn test_replicated_border_keeps_ramp() {
        let img = ImageBuffer::from_u16(4, 1, 1, vec![1, 2, 3, 4]).unwrap();
        let out = median_filter(&img, 3).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_even_size_rounds_up() {
        let values: Vec<f32> = (0..49).map(|v| ((v * 17) % 23) as f32).collect();
        let img = ImageBuffer::from_f32(7, 7, 1, values).unwrap();
        assert_eq!(
            median_filter(&img, 4).unwrap(),
            median_filter(&img, 5).unwrap()
        );
    }
}
