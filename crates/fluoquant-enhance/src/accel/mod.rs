//! Accelerated execution paths and CPU fallback.
//!
//! Whether an accelerated path may be used is decided per call: the host
//! supplies an [`AccelProbe`] (a single boolean query) and optionally an
//! [`Accelerator`] backend, and [`Acceleration::query`] folds them into a
//! value that is passed down to every stage. Nothing is cached between calls,
//! so toggling the probe takes effect on the next invocation.
//!
//! A stage tries the accelerator first through [`Acceleration::run`]. Any
//! [`AccelError`] is logged and the stage is retried once on the CPU; the
//! caller never sees the failure.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::AccelError;
use crate::stages::StructuringElement;

/// Reports whether acceleration is currently available and enabled.
pub trait AccelProbe {
    fn accel_enabled(&self) -> bool;
}

impl AccelProbe for bool {
    fn accel_enabled(&self) -> bool {
        *self
    }
}

/// Host-owned toggle that can be flipped between pipeline calls.
#[derive(Debug, Default)]
pub struct AccelSwitch {
    enabled: AtomicBool,
}

impl AccelSwitch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl AccelProbe for AccelSwitch {
    fn accel_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Backend for the stages that have an accelerated path.
///
/// All planes are single-channel, row-major `f32`. Unimplemented operations
/// report [`AccelError::Unsupported`], which sends the stage to the CPU path.
pub trait Accelerator: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    /// White top-hat (`plane - opening(plane)`).
    fn top_hat(
        &self,
        _plane: &[f32],
        _width: usize,
        _height: usize,
        _element: &StructuringElement,
    ) -> Result<Vec<f32>, AccelError> {
        Err(AccelError::Unsupported("top_hat".to_string()))
    }

    /// Contrast-limited tiled equalization over integer levels in
    /// `0..bins`, returning mapped levels.
    fn clahe(
        &self,
        _levels: &[f32],
        _width: usize,
        _height: usize,
        _bins: usize,
        _clip_limit: f32,
        _tiles: usize,
    ) -> Result<Vec<f32>, AccelError> {
        Err(AccelError::Unsupported("clahe".to_string()))
    }

    /// Bilateral filter over 8-bit levels, returning 8-bit levels.
    fn bilateral(
        &self,
        _levels: &[f32],
        _width: usize,
        _height: usize,
        _diameter: i32,
        _sigma_color: f32,
        _sigma_space: f32,
    ) -> Result<Vec<f32>, AccelError> {
        Err(AccelError::Unsupported("bilateral".to_string()))
    }
}

/// Per-call execution choice handed to every stage.
#[derive(Clone, Copy, Default)]
pub enum Acceleration<'a> {
    #[default]
    Cpu,
    Accelerated(&'a dyn Accelerator),
}

impl fmt::Debug for Acceleration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceleration::Cpu => write!(f, "Cpu"),
            Acceleration::Accelerated(backend) => write!(f, "Accelerated({})", backend.name()),
        }
    }
}

impl<'a> Acceleration<'a> {
    /// Query the probe now and pair it with the backend, if any.
    pub fn query(probe: &dyn AccelProbe, backend: Option<&'a dyn Accelerator>) -> Self {
        match backend {
            Some(backend) if probe.accel_enabled() && backend.is_available() => {
                Acceleration::Accelerated(backend)
            }
            _ => Acceleration::Cpu,
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, Acceleration::Accelerated(_))
    }

    /// Try `accelerated`, falling back to `cpu` once on failure.
    pub fn run<T>(
        self,
        stage: &str,
        accelerated: impl FnOnce(&dyn Accelerator) -> Result<T, AccelError>,
        cpu: impl FnOnce() -> T,
    ) -> T {
        if let Acceleration::Accelerated(backend) = self {
            match accelerated(backend) {
                Ok(value) => return value,
                Err(err) => tracing::warn!(
                    stage,
                    backend = backend.name(),
                    error = %err,
                    "accelerated path failed, retrying on CPU"
                ),
            }
        }
        cpu()
    }
}

/// Reject accelerator output whose length does not match the input plane.
pub(crate) fn expect_len(values: Vec<f32>, expected: usize) -> Result<Vec<f32>, AccelError> {
    if values.len() == expected {
        Ok(values)
    } else {
        Err(AccelError::Buffer(format!(
            "expected {} values, got {}",
            expected,
            values.len()
        )))
    }
}
