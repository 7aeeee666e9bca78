//! Device and adapter initialization.

use crate::error::AccelError;

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn request_adapter(instance: &wgpu::Instance) -> Option<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
}

/// Check if an adapter can be found without creating a device.
pub fn is_available() -> bool {
    let instance = instance();
    pollster::block_on(async { request_adapter(&instance).await.is_some() })
}

/// Name, type and backend of the preferred adapter.
pub fn device_info() -> Option<String> {
    let instance = instance();
    pollster::block_on(async {
        request_adapter(&instance).await.map(|adapter| {
            let info = adapter.get_info();
            format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend)
        })
    })
}

/// Initialize the wgpu device and queue.
pub async fn initialize_device(
) -> Result<(wgpu::Device, wgpu::Queue, wgpu::AdapterInfo), AccelError> {
    let instance = instance();
    let adapter = request_adapter(&instance)
        .await
        .ok_or(AccelError::NoAdapter)?;

    let adapter_info = adapter.get_info();

    // Whole 16-bit planes as f32 easily exceed the default binding size.
    let adapter_limits = adapter.limits();
    let limits = wgpu::Limits {
        max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
        max_buffer_size: adapter_limits.max_buffer_size,
        ..Default::default()
    };

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("fluoquant-enhance"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| AccelError::DeviceRequest(e.to_string()))?;

    Ok((device, queue, adapter_info))
}
