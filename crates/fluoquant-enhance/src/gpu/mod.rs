//! GPU acceleration via wgpu.
//!
//! [`GpuAccelerator`] implements [`Accelerator`] for the three stages with
//! an accelerated path: the background top-hat, CLAHE mapping, and the
//! bilateral filter. Everything else stays on the CPU.

mod buffers;
mod context;
mod ops;
mod shaders;


pub use context::GpuContext;

use crate::accel::Accelerator;
use crate::error::AccelError;
use crate::stages::StructuringElement;

/// Check if a GPU adapter is available.
pub fn is_gpu_available() -> bool {
    GpuContext::is_available()
}

/// Name, type and backend of the GPU that would be used.
pub fn gpu_info() -> Option<String> {
    GpuContext::device_info()
}

/// [`Accelerator`] backed by a wgpu device.
pub struct GpuAccelerator {
    ctx: GpuContext,
    name: String,
}

impl GpuAccelerator {
    /// Initialize the device and compile all pipelines.
    pub fn new() -> Result<Self, AccelError> {
        Ok(Self::with_context(GpuContext::new()?))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        let name = format!("wgpu:{}", ctx.adapter_info().name);
        Self { ctx, name }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl Accelerator for GpuAccelerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn top_hat(
        &self,
        plane: &[f32],
        width: usize,
        height: usize,
        element: &StructuringElement,
    ) -> Result<Vec<f32>, AccelError> {
        self.ctx.scoped("top_hat", || {
            ops::top_hat(&self.ctx, plane, width, height, element)
        })
    }

    fn clahe(
        &self,
        levels: &[f32],
        width: usize,
        height: usize,
        bins: usize,
        clip_limit: f32,
        tiles: usize,
    ) -> Result<Vec<f32>, AccelError> {
        self.ctx.scoped("clahe", || {
            ops::clahe(&self.ctx, levels, width, height, bins, clip_limit, tiles)
        })
    }

    fn bilateral(
        &self,
        levels: &[f32],
        width: usize,
        height: usize,
        diameter: i32,
        sigma_color: f32,
        sigma_space: f32,
    ) -> Result<Vec<f32>, AccelError> {
        self.ctx.scoped("bilateral", || {
            ops::bilateral(
                &self.ctx,
                levels,
                width,
                height,
                diameter,
                sigma_color,
                sigma_space,
            )
        })
    }
}
