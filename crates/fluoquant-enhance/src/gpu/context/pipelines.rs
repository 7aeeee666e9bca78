//! Compute pipelines and their bind group layouts.

use crate::gpu::shaders::Shaders;

/// Pre-compiled compute pipelines.
///
/// Every layout binds `inputs` read-only storage buffers, then the
/// read-write output buffer, then a uniform parameter block.
pub struct GpuPipelines {
    pub erode: wgpu::ComputePipeline,
    pub dilate: wgpu::ComputePipeline,
    pub morphology_layout: wgpu::BindGroupLayout,

    pub bilateral: wgpu::ComputePipeline,
    pub bilateral_layout: wgpu::BindGroupLayout,

    pub clahe_map: wgpu::ComputePipeline,
    pub clahe_layout: wgpu::BindGroupLayout,
}

pub fn create_pipelines(device: &wgpu::Device) -> GpuPipelines {
    let morphology_module = shader_module(device, "morphology", Shaders::MORPHOLOGY);
    let bilateral_module = shader_module(device, "bilateral", Shaders::BILATERAL);
    let clahe_module = shader_module(device, "clahe", Shaders::CLAHE);

    // src, mask
    let morphology_layout = storage_layout(device, "morphology_layout", 2);
    // src, taps, color weights
    let bilateral_layout = storage_layout(device, "bilateral_layout", 3);
    // src, tables
    let clahe_layout = storage_layout(device, "clahe_layout", 2);

    GpuPipelines {
        erode: create_compute_pipeline(
            device,
            "erode",
            &morphology_layout,
            &morphology_module,
            "erode",
        ),
        dilate: create_compute_pipeline(
            device,
            "dilate",
            &morphology_layout,
            &morphology_module,
            "dilate",
        ),
        bilateral: create_compute_pipeline(
            device,
            "bilateral",
            &bilateral_layout,
            &bilateral_module,
            "main",
        ),
        clahe_map: create_compute_pipeline(
            device,
            "clahe_map",
            &clahe_layout,
            &clahe_module,
            "main",
        ),
        morphology_layout,
        bilateral_layout,
        clahe_layout,
    }
}

fn shader_module(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn storage_layout(device: &wgpu::Device, label: &str, inputs: u32) -> wgpu::BindGroupLayout {
    let buffer_entry = |binding: u32, ty: wgpu::BufferBindingType| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let mut entries: Vec<_> = (0..inputs)
        .map(|binding| buffer_entry(binding, wgpu::BufferBindingType::Storage { read_only: true }))
        .collect();
    entries.push(buffer_entry(
        inputs,
        wgpu::BufferBindingType::Storage { read_only: false },
    ));
    entries.push(buffer_entry(inputs + 1, wgpu::BufferBindingType::Uniform));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}
