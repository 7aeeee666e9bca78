//! Error types for the enhancement engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the host by a pipeline or stage call.
///
/// Degenerate inputs (zero range, empty buffers, inverted percentile windows,
/// missing PSF) never produce an error; they resolve to an identity result.
/// Acceleration failures never produce an error either; see [`AccelError`].
#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("invalid value for `{key}`: expected {expected}, found {found}")]
    InvalidParameter {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("buffer length {actual} does not match {width}x{height}x{channels}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        channels: usize,
        actual: usize,
    },

    #[error("channel planes disagree: {0}")]
    ChannelMismatch(String),

    #[error("invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("wavelet denoising failed: {0}")]
    Wavelet(String),

    #[error("failed to load config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl EnhanceError {
    pub(crate) fn invalid(key: &str, expected: &'static str, found: impl ToString) -> Self {
        EnhanceError::InvalidParameter {
            key: key.to_string(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Failures of an accelerated execution path.
///
/// These are caught at the stage that raised them, logged, and the stage is
/// retried on the CPU; they never reach the host.
#[derive(Debug, Clone, Error)]
pub enum AccelError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to request GPU device: {0}")]
    DeviceRequest(String),

    #[error("buffer operation failed: {0}")]
    Buffer(String),

    #[error("GPU execution failed: {0}")]
    Execution(String),

    #[error("operation not supported by accelerator: {0}")]
    Unsupported(String),
}
