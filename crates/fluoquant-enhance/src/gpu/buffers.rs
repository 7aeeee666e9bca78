//! Buffer upload, readback and uniform parameter blocks.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::error::AccelError;

/// Parameters for `morphology.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MorphologyUniforms {
    pub width: u32,
    pub height: u32,
    pub element_width: u32,
    pub element_height: u32,
    pub _pad: [u32; 4],
}

/// Parameters for `bilateral.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BilateralUniforms {
    pub width: u32,
    pub height: u32,
    pub tap_count: u32,
    pub _pad: u32,
}

/// Parameters for `clahe.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ClaheUniforms {
    pub width: u32,
    pub height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub bins: u32,
    pub shift: u32,
}

/// Reject storage buffers the device cannot allocate or bind in one piece.
pub fn check_storage_size(limits: &wgpu::Limits, label: &str, bytes: u64) -> Result<(), AccelError> {
    let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes == 0 {
        return Err(AccelError::Buffer(format!("{label}: empty storage buffer")));
    }
    if bytes > max {
        return Err(AccelError::Buffer(format!(
            "{label}: {bytes} bytes exceeds the device limit of {max}"
        )));
    }
    Ok(())
}

/// Read-only storage buffer initialized from `data`.
pub fn upload_storage<T: Pod>(
    ctx: &GpuContext,
    label: &str,
    data: &[T],
) -> Result<wgpu::Buffer, AccelError> {
    let contents: &[u8] = bytemuck::cast_slice(data);
    check_storage_size(&ctx.device.limits(), label, contents.len() as u64)?;
    Ok(ctx
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        }))
}

/// Read-write `f32` storage buffer of `len` elements that can be read back.
pub fn create_output(ctx: &GpuContext, label: &str, len: usize) -> Result<wgpu::Buffer, AccelError> {
    let size = len
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| AccelError::Buffer(format!("{label}: {len} elements overflow")))?
        as u64;
    check_storage_size(&ctx.device.limits(), label, size)?;
    Ok(ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    }))
}

pub fn create_uniform<T: Pod>(ctx: &GpuContext, label: &str, params: &T) -> wgpu::Buffer {
    ctx.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
}

/// Copy `len` floats from `buffer` back to the host.
pub fn download(ctx: &GpuContext, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<f32>, AccelError> {
    let size = (len * std::mem::size_of::<f32>()) as u64;

    let staging_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staging_buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("download_encoder"),
        });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        // A dropped receiver surfaces through recv() below.
        let _ = tx.send(result);
    });

    ctx.device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|e| AccelError::Buffer(e.to_string()))?
        .map_err(|e| AccelError::Buffer(e.to_string()))?;

    let data = buffer_slice.get_mapped_range();
    let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();

    drop(data);
    staging_buffer.unmap();

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_size_respects_binding_limit() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        };
        assert!(check_storage_size(&limits, "plane", 128 << 20).is_ok());

        // 8192x8192 f32 plane
        let err = check_storage_size(&limits, "plane", 8192 * 8192 * 4).unwrap_err();
        assert!(matches!(err, AccelError::Buffer(msg) if msg.starts_with("plane")));
        assert!(matches!(
            check_storage_size(&limits, "taps", 0),
            Err(AccelError::Buffer(_))
        ));
    }

    #[test]
    fn test_storage_size_respects_buffer_limit() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: u32::MAX,
            max_buffer_size: 1 << 20,
            ..wgpu::Limits::default()
        };
        assert!(check_storage_size(&limits, "plane", 1 << 20).is_ok());
        assert!(check_storage_size(&limits, "plane", (1 << 20) + 4).is_err());
    }
}
