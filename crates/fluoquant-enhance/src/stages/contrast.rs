//! Local contrast by contrast-limited tiled histogram equalization.
//!
//! The image is divided into `tiles x tiles` regions (padded by reflection
//! when the dimensions do not divide evenly). Each region gets a clipped,
//! redistributed histogram whose cumulative sum becomes a look-up table, and
//! every pixel is mapped by bilinear interpolation between the four nearest
//! region tables.

use super::border::reflect101;
use crate::accel::{expect_len, Acceleration};
use crate::error::EnhanceError;
use crate::image::{map_channels, ImageBuffer, LevelScaler, PixelType};
use crate::parallel::for_each_row_mut;

/// Clip-limit multiplier for 16-bit (and rescaled floating) input.
pub const CLIP_SCALE_U16: f32 = 1000.0;
/// Clip-limit multiplier for 8-bit input.
pub const CLIP_SCALE_U8: f32 = 100.0;
/// Smallest tile grid side.
pub const MIN_TILES: usize = 2;
/// Upper bound on `tiles * bins` look-up entries; 16-bit histograms are
/// coarsened by powers of two to stay under it.
const MAX_LUT_ENTRIES: usize = 1 << 22;

/// Apply tiled equalization to every channel.
///
/// `clip_limit` is the dimensionless strength knob; it is scaled by the
/// element type (x1000 for 16-bit, x100 for 8-bit). Floating input is mapped
/// to 16-bit levels through its own min/max, equalized, and mapped back, so
/// the element type is preserved; a flat floating plane is returned as is.
pub fn local_contrast(
    image: &ImageBuffer,
    clip_limit: f32,
    tile_size: usize,
    accel: Acceleration<'_>,
) -> Result<ImageBuffer, EnhanceError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let tiles = tile_size.max(MIN_TILES);
    let (width, height) = (image.width(), image.height());

    map_channels(image, |plane| {
        let values = plane.to_f32();
        let (levels, bins, limit, scaler) = match plane.pixel_type() {
            PixelType::U8 => (values, 256, clip_limit * CLIP_SCALE_U8, None),
            PixelType::U16 => (values, 65536, clip_limit * CLIP_SCALE_U16, None),
            PixelType::F32 => {
                let Some(scaler) = LevelScaler::observe(&values) else {
                    return Ok(plane.clone());
                };
                if scaler.is_flat() {
                    return Ok(plane.clone());
                }
                (
                    scaler.to_u16_levels(&values),
                    65536,
                    clip_limit * CLIP_SCALE_U16,
                    Some(scaler),
                )
            }
        };

        let mapped = accel.run(
            "contrast",
            |backend| {
                backend
                    .clahe(&levels, width, height, bins, limit, tiles)
                    .and_then(|out| expect_len(out, levels.len()))
            },
            || clahe_levels(&levels, width, height, bins, limit, tiles),
        );

        Ok(match scaler {
            Some(scaler) => plane.with_values(scaler.from_levels(&mapped, LevelScaler::U16_LEVELS)),
            None => plane.with_values(mapped),
        })
    })
}

/// Equalize a plane of integer levels in `0..bins`.
pub fn clahe_levels(
    levels: &[f32],
    width: usize,
    height: usize,
    bins: usize,
    clip_limit: f32,
    tiles: usize,
) -> Vec<f32> {
    if levels.is_empty() {
        return Vec::new();
    }
    let luts = TileLuts::build(levels, width, height, bins, clip_limit, tiles);
    luts.interpolate(levels, width)
}

/// Per-tile look-up tables for one plane.
#[derive(Debug, Clone)]
pub struct TileLuts {
    pub tiles_x: usize,
    pub tiles_y: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    /// Histogram bins per tile after coarsening
    pub bins: usize,
    /// Right shift from input level to bin
    pub shift: u32,
    /// `tiles_y * tiles_x` tables of `bins` entries, row-major by tile
    pub tables: Vec<f32>,
}

impl TileLuts {
    /// Build clipped-histogram tables. `full_bins` is 256 or 65536; the tile
    /// grid is clamped to the plane dimensions.
    pub fn build(
        levels: &[f32],
        width: usize,
        height: usize,
        full_bins: usize,
        clip_limit: f32,
        tiles: usize,
    ) -> Self {
        let tiles_x = tiles.clamp(1, width.max(1));
        let tiles_y = tiles.clamp(1, height.max(1));
        let padded_w = round_up(width, tiles_x);
        let padded_h = round_up(height, tiles_y);
        let tile_width = padded_w / tiles_x;
        let tile_height = padded_h / tiles_y;
        let tile_area = tile_width * tile_height;

        let mut bins = full_bins.max(2);
        let mut shift = 0u32;
        while bins > 256 && bins * tiles_x * tiles_y > MAX_LUT_ENTRIES {
            bins >>= 1;
            shift += 1;
        }

        let limit = if clip_limit > 0.0 {
            ((clip_limit as f64 * tile_area as f64 / bins as f64) as u64).max(1)
        } else {
            0
        };
        let lut_scale = (bins - 1) as f64 / tile_area as f64;

        let mut tables = vec![0.0f32; tiles_x * tiles_y * bins];
        for_each_row_mut(&mut tables, bins, |tile, table| {
            let (tx, ty) = (tile % tiles_x, tile / tiles_x);
            let mut hist = vec![0u64; bins];
            for py in ty * tile_height..(ty + 1) * tile_height {
                let sy = reflect101(py, height);
                let row = &levels[sy * width..(sy + 1) * width];
                for px in tx * tile_width..(tx + 1) * tile_width {
                    let bin = ((row[reflect101(px, width)] as usize) >> shift).min(bins - 1);
                    hist[bin] += 1;
                }
            }

            if limit > 0 {
                clip_histogram(&mut hist, limit);
            }

            let mut sum = 0u64;
            for (entry, &count) in table.iter_mut().zip(&hist) {
                sum += count;
                *entry = (sum as f64 * lut_scale).round().min((bins - 1) as f64) as f32;
            }
        });

        Self {
            tiles_x,
            tiles_y,
            tile_width,
            tile_height,
            bins,
            shift,
            tables,
        }
    }

    /// Map every level through the bilinear blend of its four nearest tile
    /// tables.
    pub fn interpolate(&self, levels: &[f32], width: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; levels.len()];
        let inv_tw = 1.0 / self.tile_width as f32;
        let inv_th = 1.0 / self.tile_height as f32;
        let max_bin = self.bins - 1;

        for_each_row_mut(&mut out, width, |y, row| {
            let (ty1, ty2, ya) = tile_coords(y, inv_th, self.tiles_y);
            let src = &levels[y * width..(y + 1) * width];
            for (x, out_v) in row.iter_mut().enumerate() {
                let (tx1, tx2, xa) = tile_coords(x, inv_tw, self.tiles_x);
                let bin = ((src[x] as usize) >> self.shift).min(max_bin);
                let lut = |ty: usize, tx: usize| self.tables[(ty * self.tiles_x + tx) * self.bins + bin];
                let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
                let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
                let res = (top * (1.0 - ya) + bottom * ya).round().clamp(0.0, max_bin as f32);
                *out_v = ((res as u32) << self.shift) as f32;
            }
        });
        out
    }
}

/// Clip at `limit` and spread the excess evenly, then the remainder one count
/// at a time at a fixed stride.
fn clip_histogram(hist: &mut [u64], limit: u64) {
    let bins = hist.len() as u64;
    let mut clipped = 0u64;
    for count in hist.iter_mut() {
        if *count > limit {
            clipped += *count - limit;
            *count = limit;
        }
    }

    let batch = clipped / bins;
    let mut residual = clipped - batch * bins;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (bins / residual).max(1) as usize;
        let mut i = 0;
        while i < hist.len() && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

#[inline]
fn tile_coords(pos: usize, inv_size: f32, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 * inv_size - 0.5;
    let t1 = f.floor();
    let frac = f - t1;
    let t1 = t1 as isize;
    let t2 = t1 + 1;
    let t1 = t1.max(0) as usize;
    let t2 = (t2.max(0) as usize).min(tiles - 1);
    (t1, t2, frac)
}

fn round_up(value: usize, multiple: usize) -> usize {
    if value % multiple == 0 {
        value
    } else {
        value + multiple - value % multiple
    }
}
