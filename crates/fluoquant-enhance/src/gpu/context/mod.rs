//! wgpu device, queue and compiled pipelines.

mod init;
mod pipelines;

use std::sync::{Arc, Mutex};

pub use pipelines::GpuPipelines;

use crate::error::AccelError;

/// GPU context holding the wgpu device, queue, and pre-compiled pipelines.
pub struct GpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) pipelines: GpuPipelines,
    adapter_info: wgpu::AdapterInfo,
    /// Error scopes are a device-wide stack; one operation at a time.
    scope_lock: Mutex<()>,
}

impl GpuContext {
    /// Check if GPU acceleration is available without fully initializing.
    pub fn is_available() -> bool {
        init::is_available()
    }

    /// Get information about the available GPU device.
    pub fn device_info() -> Option<String> {
        init::device_info()
    }

    /// Create a new GPU context, initializing the device and compiling all shaders.
    pub fn new() -> Result<Self, AccelError> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self, AccelError> {
        let (device, queue, adapter_info) = init::initialize_device().await?;
        let pipelines = pipelines::create_pipelines(&device);
        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(error = %err, "uncaptured wgpu error");
        }));

        tracing::debug!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU context ready"
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pipelines,
            adapter_info,
            scope_lock: Mutex::new(()),
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Run `op` inside validation and out-of-memory error scopes.
    ///
    /// Device errors raised while `op` runs are returned as
    /// [`AccelError::Execution`] instead of reaching the uncaptured handler.
    pub fn scoped<T>(
        &self,
        label: &str,
        op: impl FnOnce() -> Result<T, AccelError>,
    ) -> Result<T, AccelError> {
        let _guard = self
            .scope_lock
            .lock()
            .map_err(|_| AccelError::Execution(format!("{label}: GPU context poisoned")))?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = op();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(err) => Err(AccelError::Execution(format!("{label}: {err}"))),
            None => result,
        }
    }

    /// Submit a command encoder and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }
}
