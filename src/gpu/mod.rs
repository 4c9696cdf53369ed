//! wgpu backends for the device seams.
//!
//! - [`GpuParticles`]: particle + counter storage buffers and the physics kernel
//! - [`GpuFlowVolume`]: `Rgba16Float` 3D texture and the flow generator
//! - [`SpritePipeline`]: instanced, alpha-blended sprite quads
//!
//! All three share a [`GpuContext`]. Kernels are compiled inside a validation
//! error scope so a bad shader surfaces as [`GpuError::ShaderCompilation`]
//! instead of a device panic.

mod camera;
mod flow_volume;
mod particles;
mod sprites;

use std::sync::mpsc;
use std::sync::Arc;

use bytemuck::Pod;

pub use camera::Camera;
pub use flow_volume::GpuFlowVolume;
pub use particles::GpuParticles;
pub use sprites::{SpritePipeline, SpriteUniforms};

use crate::error::GpuError;

/// Adapter, device and queue.
#[derive(Clone)]
pub struct GpuContext {
    pub adapter: Arc<wgpu::Adapter>,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Acquire a device without a surface (compute only).
    pub fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        pollster::block_on(Self::request(&instance, None))
    }

    /// Acquire a device, optionally compatible with `surface`.
    pub async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Plume Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("GPU uncaptured error: {}", error);
        }));

        Ok(Self {
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Compile a compute kernel with entry point `main`.
///
/// Validation failures (WGSL errors, layout mismatches) are caught by an
/// error scope, logged, and returned.
pub fn compile_compute(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layout: &wgpu::PipelineLayout,
) -> Result<wgpu::ComputePipeline, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => {
            log::error!("failed to compile '{}': {}", label, error);
            Err(GpuError::ShaderCompilation {
                label: label.to_string(),
                message: error.to_string(),
            })
        }
        None => Ok(pipeline),
    }
}

/// Blocking copy of `count` elements starting at byte `offset` of `source`.
///
/// `source` needs `COPY_SRC` usage.
pub fn read_buffer<T: Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    offset: u64,
    count: usize,
) -> Result<Vec<T>, GpuError> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    if size == 0 {
        return Ok(Vec::new());
    }

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(source, offset, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(GpuError::BufferMapping(e.to_string())),
        Err(_) => return Err(GpuError::BufferMapping("map callback dropped".into())),
    }

    let out = {
        let data = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, T>(&data).to_vec()
    };
    staging.unmap();
    Ok(out)
}
