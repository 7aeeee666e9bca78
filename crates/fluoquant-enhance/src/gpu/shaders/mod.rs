//! WGSL shader sources embedded at compile time.

/// Container for all shader source code.
pub struct Shaders;

impl Shaders {
    /// Flat erosion and dilation (`erode` / `dilate` entry points).
    pub const MORPHOLOGY: &'static str = include_str!("morphology.wgsl");

    /// Bilateral filter over 8-bit levels.
    pub const BILATERAL: &'static str = include_str!("bilateral.wgsl");

    /// CLAHE tile-table interpolation.
    pub const CLAHE: &'static str = include_str!("clahe.wgsl");
}
