//! FluoQuant Enhance
//!
//! Display enhancement for fluorescence microscopy images: percentile
//! stretch, background suppression, CLAHE, edge-preserving smoothing and
//! display gamma, with deconvolution and denoising stages for previews.
//! Quantitative data is never modified; every stage returns a new buffer.

pub mod accel;
pub mod auto_adjust;
pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod stages;

pub(crate) mod parallel;

// GPU acceleration module (optional, enabled with "gpu" feature)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types
pub use accel::{AccelProbe, AccelSwitch, Acceleration, Accelerator};
pub use auto_adjust::{estimate_auto_params, AutoParams, EnhancePercents};
pub use config::{
    load_enhance_config, EnhanceConfig, EnhanceConfigHandle, ParamValue, StageConfig,
    StageDefaults,
};
pub use error::{AccelError, EnhanceError};
pub use image::{ImageBuffer, PixelData, PixelType};
pub use pipeline::{apply_pipeline, process_realtime};
pub use stages::Stage;

#[cfg(feature = "gpu")]
pub use gpu::{gpu_info, is_gpu_available, GpuAccelerator};
