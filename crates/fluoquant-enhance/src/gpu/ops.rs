//! Encoding and dispatch of the accelerated operations.

use super::buffers::{
    create_output, create_uniform, download, upload_storage, BilateralUniforms, ClaheUniforms,
    MorphologyUniforms,
};
use super::context::GpuContext;
use crate::error::AccelError;
use crate::stages::{BilateralKernel, StructuringElement, TileLuts};

/// Must match `@workgroup_size` in the shaders.
const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

/// Workgroup grid for `count` invocations, folded into two dimensions when
/// one is not enough.
fn workgroup_grid(count: u32) -> Result<(u32, u32), AccelError> {
    let total = count.div_ceil(WORKGROUP_SIZE);
    if total <= MAX_WORKGROUPS_PER_DIM {
        return Ok((total.max(1), 1));
    }

    let side = ((total as f64).sqrt().ceil() as u32).min(MAX_WORKGROUPS_PER_DIM);
    let rows = total.div_ceil(side);
    if rows > MAX_WORKGROUPS_PER_DIM {
        return Err(AccelError::Execution(format!(
            "{} workgroups exceed the dispatch limit",
            total
        )));
    }
    Ok((side, rows))
}

/// Plane dimensions as shader integers.
fn plane_dims(width: usize, height: usize) -> Result<(u32, u32, u32), AccelError> {
    let count = width
        .checked_mul(height)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AccelError::Unsupported(format!("{}x{} plane", width, height)))?;
    Ok((width as u32, height as u32, count))
}

/// Record one compute pass binding `buffers` in order.
fn encode_pass(
    ctx: &GpuContext,
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::ComputePipeline,
    layout: &wgpu::BindGroupLayout,
    buffers: &[&wgpu::Buffer],
    count: u32,
    label: &'static str,
) -> Result<(), AccelError> {
    let entries: Vec<_> = buffers
        .iter()
        .enumerate()
        .map(|(binding, buffer)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    });

    let (x, y) = workgroup_grid(count)?;
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, &bind_group, &[]);
    pass.dispatch_workgroups(x, y, 1);
    Ok(())
}

fn new_encoder(ctx: &GpuContext, label: &str) -> wgpu::CommandEncoder {
    ctx.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
}

/// White top-hat: erosion and dilation run on the device, the subtraction
/// on the host.
pub fn top_hat(
    ctx: &GpuContext,
    plane: &[f32],
    width: usize,
    height: usize,
    element: &StructuringElement,
) -> Result<Vec<f32>, AccelError> {
    if plane.is_empty() {
        return Ok(Vec::new());
    }
    let (w, h, count) = plane_dims(width, height)?;
    let mask: Vec<u32> = element.mask().iter().map(|&m| m as u32).collect();

    let src = upload_storage(ctx, "top_hat_src", plane)?;
    let mask_buffer = upload_storage(ctx, "top_hat_mask", &mask)?;
    let eroded = create_output(ctx, "top_hat_eroded", plane.len())?;
    let opened = create_output(ctx, "top_hat_opened", plane.len())?;
    let params = create_uniform(
        ctx,
        "morphology_params",
        &MorphologyUniforms {
            width: w,
            height: h,
            element_width: element.width() as u32,
            element_height: element.height() as u32,
            _pad: [0; 4],
        },
    );

    let pipelines = &ctx.pipelines;
    let mut encoder = new_encoder(ctx, "top_hat_encoder");
    encode_pass(
        ctx,
        &mut encoder,
        &pipelines.erode,
        &pipelines.morphology_layout,
        &[&src, &mask_buffer, &eroded, &params],
        count,
        "erode",
    )?;
    encode_pass(
        ctx,
        &mut encoder,
        &pipelines.dilate,
        &pipelines.morphology_layout,
        &[&eroded, &mask_buffer, &opened, &params],
        count,
        "dilate",
    )?;
    ctx.submit_and_wait(encoder);

    let opening = download(ctx, &opened, plane.len())?;
    Ok(plane.iter().zip(&opening).map(|(v, o)| v - o).collect())
}

pub fn bilateral(
    ctx: &GpuContext,
    levels: &[f32],
    width: usize,
    height: usize,
    diameter: i32,
    sigma_color: f32,
    sigma_space: f32,
) -> Result<Vec<f32>, AccelError> {
    if levels.is_empty() {
        return Ok(Vec::new());
    }
    let (w, h, count) = plane_dims(width, height)?;
    let kernel = BilateralKernel::new(diameter, sigma_color, sigma_space);
    let taps: Vec<[f32; 4]> = kernel
        .taps
        .iter()
        .map(|&(dy, dx, weight)| [dy as f32, dx as f32, weight, 0.0])
        .collect();

    let src = upload_storage(ctx, "bilateral_src", levels)?;
    let tap_buffer = upload_storage(ctx, "bilateral_taps", &taps)?;
    let color_buffer = upload_storage(ctx, "bilateral_color", &kernel.color_weights[..])?;
    let dst = create_output(ctx, "bilateral_dst", levels.len())?;
    let params = create_uniform(
        ctx,
        "bilateral_params",
        &BilateralUniforms {
            width: w,
            height: h,
            tap_count: taps.len() as u32,
            _pad: 0,
        },
    );

    let mut encoder = new_encoder(ctx, "bilateral_encoder");
    encode_pass(
        ctx,
        &mut encoder,
        &ctx.pipelines.bilateral,
        &ctx.pipelines.bilateral_layout,
        &[&src, &tap_buffer, &color_buffer, &dst, &params],
        count,
        "bilateral",
    )?;
    ctx.submit_and_wait(encoder);

    download(ctx, &dst, levels.len())
}

/// CLAHE with the tile tables built on the host and the per-pixel blend on
/// the device.
pub fn clahe(
    ctx: &GpuContext,
    levels: &[f32],
    width: usize,
    height: usize,
    bins: usize,
    clip_limit: f32,
    tiles: usize,
) -> Result<Vec<f32>, AccelError> {
    if levels.is_empty() {
        return Ok(Vec::new());
    }
    let (w, h, count) = plane_dims(width, height)?;
    let luts = TileLuts::build(levels, width, height, bins, clip_limit, tiles);

    let src = upload_storage(ctx, "clahe_src", levels)?;
    let tables = upload_storage(ctx, "clahe_tables", &luts.tables)?;
    let dst = create_output(ctx, "clahe_dst", levels.len())?;
    let params = create_uniform(
        ctx,
        "clahe_params",
        &ClaheUniforms {
            width: w,
            height: h,
            tiles_x: luts.tiles_x as u32,
            tiles_y: luts.tiles_y as u32,
            tile_width: luts.tile_width as u32,
            tile_height: luts.tile_height as u32,
            bins: luts.bins as u32,
            shift: luts.shift,
        },
    );

    let mut encoder = new_encoder(ctx, "clahe_encoder");
    encode_pass(
        ctx,
        &mut encoder,
        &ctx.pipelines.clahe_map,
        &ctx.pipelines.clahe_layout,
        &[&src, &tables, &dst, &params],
        count,
        "clahe_map",
    )?;
    ctx.submit_and_wait(encoder);

    download(ctx, &dst, levels.len())
}
