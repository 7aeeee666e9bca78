//! Parallelization helpers for per-row image kernels
//!
//! Kernels that read an immutable source and write one output row at a time
//! share the same shape: run sequentially on small images and fan out over
//! rayon on large ones. Every output element depends only on the source, so
//! results are identical regardless of how rows are scheduled.

use rayon::prelude::*;

/// Minimum number of elements before work is split across threads.
pub const PARALLEL_THRESHOLD: usize = 30_000;

/// Fill `out` row by row with `f(y, row)`.
///
/// `row_len` is the number of elements per row; `out.len()` must be a multiple
/// of it.
pub fn for_each_row_mut<T, F>(out: &mut [T], row_len: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    if row_len == 0 {
        return;
    }
    if out.len() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    } else {
        for (y, row) in out.chunks_mut(row_len).enumerate() {
            f(y, row);
        }
    }
}

/// Parallel fold/reduce over chunks with automatic threshold-based dispatch.
///
/// ```ignore
/// let hist = parallel_fold_reduce(
///     &levels,
///     1024,
///     || vec![0u32; 256],
///     |mut acc, chunk| { for v in chunk { acc[*v as usize] += 1; } acc },
///     |a, b| a.iter().zip(&b).map(|(x, y)| x + y).collect(),
/// );
/// ```
pub fn parallel_fold_reduce<T, A, I, F, R>(
    data: &[T],
    chunk_size: usize,
    init: I,
    fold_fn: F,
    reduce_fn: R,
) -> A
where
    T: Sync,
    A: Send,
    I: Fn() -> A + Sync + Send,
    F: Fn(A, &[T]) -> A + Sync + Send,
    R: Fn(A, A) -> A + Sync + Send,
{
    let chunk_size = chunk_size.max(1);
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_chunks(chunk_size)
            .fold(&init, &fold_fn)
            .reduce(&init, &reduce_fn)
    } else {
        let mut acc = init();
        for chunk in data.chunks(chunk_size) {
            acc = fold_fn(acc, chunk);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_fill_matches_sequential() {
        let width = 300;
        let height = 200;
        let mut out = vec![0usize; width * height];
        for_each_row_mut(&mut out, width, |y, row| {
            for (x, v) in row.iter_mut().enumerate() {
                *v = y * width + x;
            }
        });
        assert!(out.iter().enumerate().all(|(i, v)| i == *v));
    }

    #[test]
    fn test_fold_reduce_sums() {
        let data: Vec<u64> = (0..100_000).collect();
        let sum = parallel_fold_reduce(
            &data,
            4096,
            || 0u64,
            |acc, chunk| acc + chunk.iter().sum::<u64>(),
            |a, b| a + b,
        );
        assert_eq!(sum, 99_999 * 100_000 / 2);
    }
}
