//! Grey-level morphology with arbitrary flat structuring elements.
//!
//! Each element row is decomposed into horizontal runs. A run of length `L`
//! is a 1-D sliding min/max, computed in O(1) per pixel with the van Herk /
//! Gil-Werman block trick, so cost grows with the number of runs (about the
//! element height for convex shapes), not with the element area.
//!
//! Pixels outside the image never participate.

use crate::error::EnhanceError;
use crate::parallel::for_each_row_mut;

/// Flat structuring element with its anchor at the centre.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuringElement {
    width: usize,
    height: usize,
    mask: Vec<bool>,
    /// `(dy, x_start, x_end)` relative to the anchor, `x_end` exclusive
    runs: Vec<(isize, isize, isize)>,
}

impl StructuringElement {
    /// Elliptical element inscribed in a `diameter x diameter` box.
    ///
    /// Row extents follow the conventional discrete ellipse used by imaging
    /// libraries: half-width `round(c * sqrt((r^2 - dy^2) / r^2))`.
    pub fn ellipse(diameter: usize) -> Self {
        let size = diameter.max(1);
        let r = (size / 2) as isize;
        let c = (size / 2) as isize;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };

        let mut mask = vec![false; size * size];
        for i in 0..size as isize {
            let dy = i - r;
            if dy.abs() > r {
                continue;
            }
            let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as isize;
            let j1 = (c - dx).max(0) as usize;
            let j2 = ((c + dx + 1) as usize).min(size);
            for j in j1..j2 {
                mask[i as usize * size + j] = true;
            }
        }

        Self::from_parts(size, size, mask)
    }

    /// Element from a caller-supplied row-major mask.
    pub fn from_mask(width: usize, height: usize, mask: Vec<bool>) -> Result<Self, EnhanceError> {
        if width == 0 || height == 0 || mask.len() != width * height {
            return Err(EnhanceError::InvalidKernel(format!(
                "mask of {} entries does not describe a {}x{} element",
                mask.len(),
                width,
                height
            )));
        }
        if !mask.iter().any(|&m| m) {
            return Err(EnhanceError::InvalidKernel(
                "structuring element is empty".to_string(),
            ));
        }
        Ok(Self::from_parts(width, height, mask))
    }

    fn from_parts(width: usize, height: usize, mask: Vec<bool>) -> Self {
        let ax = (width / 2) as isize;
        let ay = (height / 2) as isize;
        let mut runs = Vec::new();
        for y in 0..height {
            let row = &mask[y * width..(y + 1) * width];
            let mut x = 0;
            while x < width {
                if !row[x] {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < width && row[x] {
                    x += 1;
                }
                runs.push((y as isize - ay, start as isize - ax, x as isize - ax));
            }
        }
        Self {
            width,
            height,
            mask,
            runs,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Horizontal runs as `(dy, x_start, x_end)` offsets from the anchor.
    pub fn runs(&self) -> &[(isize, isize, isize)] {
        &self.runs
    }
}

/// Force a kernel diameter odd and at least 3.
pub fn normalize_kernel_size(size: usize) -> usize {
    let size = size.max(3);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

#[derive(Clone, Copy)]
enum MorphOp {
    Erode,
    Dilate,
}

impl MorphOp {
    #[inline]
    fn identity(self) -> f32 {
        match self {
            MorphOp::Erode => f32::INFINITY,
            MorphOp::Dilate => f32::NEG_INFINITY,
        }
    }

    #[inline]
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MorphOp::Erode => a.min(b),
            MorphOp::Dilate => a.max(b),
        }
    }
}

/// Minimum filter over `element`.
pub fn erode(plane: &[f32], width: usize, height: usize, element: &StructuringElement) -> Vec<f32> {
    morph(plane, width, height, element, MorphOp::Erode)
}

/// Maximum filter over `element`.
pub fn dilate(plane: &[f32], width: usize, height: usize, element: &StructuringElement) -> Vec<f32> {
    morph(plane, width, height, element, MorphOp::Dilate)
}

/// Erosion followed by dilation.
pub fn opening(plane: &[f32], width: usize, height: usize, element: &StructuringElement) -> Vec<f32> {
    let eroded = erode(plane, width, height, element);
    dilate(&eroded, width, height, element)
}

/// White top-hat: `plane - opening(plane)`.
pub fn top_hat(plane: &[f32], width: usize, height: usize, element: &StructuringElement) -> Vec<f32> {
    let opened = opening(plane, width, height, element);
    plane.iter().zip(&opened).map(|(v, o)| v - o).collect()
}

fn morph(
    plane: &[f32],
    width: usize,
    height: usize,
    element: &StructuringElement,
    op: MorphOp,
) -> Vec<f32> {
    let mut out = vec![0.0f32; plane.len()];
    if plane.is_empty() {
        return out;
    }

    for_each_row_mut(&mut out, width, |y, row| {
        row.fill(op.identity());
        let mut scratch = Vec::new();
        for &(dy, x0, x1) in element.runs() {
            let sy = y as isize + dy;
            if sy < 0 || sy >= height as isize {
                continue;
            }
            let src = &plane[sy as usize * width..(sy as usize + 1) * width];
            sliding_extreme(src, x0, x1, op, &mut scratch);
            for (o, s) in row.iter_mut().zip(&scratch) {
                *o = op.combine(*o, *s);
            }
        }
        // Only reachable with masks that exclude the anchor row entirely.
        let src = &plane[y * width..(y + 1) * width];
        for (o, s) in row.iter_mut().zip(src) {
            if o.is_infinite() {
                *o = *s;
            }
        }
    });

    out
}

/// `out[x] = op(src[x + x0 .. x + x1])`, treating out-of-range samples as the
/// identity.
fn sliding_extreme(src: &[f32], x0: isize, x1: isize, op: MorphOp, out: &mut Vec<f32>) {
    let width = src.len();
    let len = (x1 - x0).max(1) as usize;
    let padded_len = width + len - 1;

    let sample = |i: usize| -> f32 {
        let x = i as isize + x0;
        if x >= 0 && (x as usize) < width {
            src[x as usize]
        } else {
            op.identity()
        }
    };

    out.clear();
    if len == 1 {
        out.extend((0..width).map(sample));
        return;
    }

    // Forward running extreme within each block, backward running extreme
    // within each block; any window of `len` spans at most two blocks.
    let mut forward = vec![0.0f32; padded_len];
    let mut backward = vec![0.0f32; padded_len];
    for i in 0..padded_len {
        let v = sample(i);
        forward[i] = if i % len == 0 {
            v
        } else {
            op.combine(forward[i - 1], v)
        };
    }
    for i in (0..padded_len).rev() {
        let v = sample(i);
        backward[i] = if i == padded_len - 1 || (i + 1) % len == 0 {
            v
        } else {
            op.combine(backward[i + 1], v)
        };
    }

    out.extend((0..width).map(|x| op.combine(backward[x], forward[x + len - 1])));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(
        plane: &[f32],
        width: usize,
        height: usize,
        element: &StructuringElement,
        erode: bool,
    ) -> Vec<f32> {
        let mut out = vec![0.0; plane.len()];
        for y in 0..height as isize {
            for x in 0..width as isize {
                let mut acc = if erode { f32::INFINITY } else { f32::NEG_INFINITY };
                for &(dy, x0, x1) in element.runs() {
                    for dx in x0..x1 {
                        let (sx, sy) = (x + dx, y + dy);
                        if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                            continue;
                        }
                        let v = plane[sy as usize * width + sx as usize];
                        acc = if erode { acc.min(v) } else { acc.max(v) };
                    }
                }
                out[y as usize * width + x as usize] = acc;
            }
        }
        out
    }

    fn noise_plane(width: usize, height: usize) -> Vec<f32> {
        (0..width * height)
            .map(|i| ((i * 7919 + 13) % 251) as f32)
            .collect()
    }

    #[test]
    fn test_ellipse_shape() {
        let e = StructuringElement::ellipse(5);
        #[rustfmt::skip]
        let expected = [
            false, false, true,  false, false,
            true,  true,  true,  true,  true,
            true,  true,  true,  true,  true,
            true,  true,  true,  true,  true,
            false, false, true,  false, false,
        ];
        assert_eq!(e.mask(), &expected);
        assert_eq!(e.runs().len(), 5);
    }

    #[test]
    fn test_erode_dilate_match_brute_force() {
        let (w, h) = (23, 17);
        let plane = noise_plane(w, h);
        for d in [3, 5, 7, 11] {
            let e = StructuringElement::ellipse(d);
            assert_eq!(erode(&plane, w, h, &e), brute_force(&plane, w, h, &e, true));
            assert_eq!(dilate(&plane, w, h, &e), brute_force(&plane, w, h, &e, false));
        }
    }

    #[test]
    fn test_element_larger_than_image() {
        let (w, h) = (4, 3);
        let plane = noise_plane(w, h);
        let e = StructuringElement::ellipse(21);
        assert_eq!(erode(&plane, w, h, &e), brute_force(&plane, w, h, &e, true));
    }

    #[test]
    fn test_top_hat_removes_flat_background() {
        let (w, h) = (32, 32);
        let mut plane = vec![100.0f32; w * h];
        plane[16 * w + 16] = 180.0;
        let e = StructuringElement::ellipse(5);
        let th = top_hat(&plane, w, h, &e);
        assert_eq!(th[16 * w + 16], 80.0);
        assert_eq!(th.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_opening_is_anti_extensive() {
        let (w, h) = (19, 29);
        let plane = noise_plane(w, h);
        let opened = opening(&plane, w, h, &StructuringElement::ellipse(7));
        assert!(opened.iter().zip(&plane).all(|(o, p)| o <= p));
    }

    #[test]
    fn test_normalize_kernel_size() {
        assert_eq!(normalize_kernel_size(0), 3);
        assert_eq!(normalize_kernel_size(4), 5);
        assert_eq!(normalize_kernel_size(50), 51);
        assert_eq!(normalize_kernel_size(7), 7);
    }

    #[test]
    fn test_from_mask_rejects_empty() {
        assert!(StructuringElement::from_mask(2, 2, vec![false; 4]).is_err());
        assert!(StructuringElement::from_mask(2, 2, vec![true; 3]).is_err());
    }
}
