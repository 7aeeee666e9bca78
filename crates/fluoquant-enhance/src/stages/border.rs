//! Border extension for neighbourhood kernels.

/// Reflect-101 index (`gfedcb|abcdefgh|gfedcba`) for a non-negative
/// position.
#[inline]
pub(crate) fn reflect101(i: usize, len: usize) -> usize {
    reflect101_signed(i as isize, len)
}

/// Reflect-101 index for any offset, reflecting repeatedly when the offset
/// is wider than the signal.
#[inline]
pub(crate) fn reflect101_signed(mut i: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let n = len as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * (n - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// Clamp-to-edge index (`aaaaaa|abcdefgh|hhhhhhh`).
#[inline]
pub(crate) fn replicate(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect101() {
        let idx: Vec<usize> = (-3..8).map(|i| reflect101_signed(i, 5)).collect();
        assert_eq!(idx, vec![3, 2, 1, 0, 1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(reflect101_signed(7, 1), 0);
        assert_eq!(reflect101_signed(9, 3), 1);
    }

    #[test]
    fn test_replicate() {
        let idx: Vec<usize> = (-2..6).map(|i| replicate(i, 4)).collect();
        assert_eq!(idx, vec![0, 0, 0, 1, 2, 3, 3, 3]);
    }
}
