//! Flow lattice as a 3D storage texture.

use std::sync::Arc;

use glam::{UVec3, Vec3};

use super::{compile_compute, GpuContext};
use crate::device::{workgroup_count, FlowSource, FlowVolume};
use crate::error::GpuError;
use crate::flow_device::WindUniforms;
use crate::shaders::{flow_generate_source, FLOW_WORKGROUP_SIZE};

/// `Rgba16Float` volume written by the flow generator and sampled (linear,
/// clamp-to-edge) by the physics kernel.
pub struct GpuFlowVolume {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    resolution: UVec3,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    min: Vec3,
    max: Vec3,
}

impl GpuFlowVolume {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Allocate a `resolution` volume (each axis at least 2) and compile the
    /// generator.
    pub fn new(ctx: &GpuContext, resolution: UVec3) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let resolution = resolution.max(UVec3::splat(2));

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Flow Volume"),
            size: wgpu::Extent3d {
                width: resolution.x,
                height: resolution.y,
                depth_or_array_layers: resolution.z,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Flow Volume View"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Flow Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wind Uniforms"),
            size: std::mem::size_of::<WindUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (pipeline, layout) = create_generate_pipeline(device)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flow Generate Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
            ],
        });

        log::info!(
            "allocated flow volume {}x{}x{}",
            resolution.x,
            resolution.y,
            resolution.z
        );

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            resolution,
            _texture: texture,
            view,
            sampler,
            uniform_buffer,
            pipeline,
            bind_group,
            min: Vec3::ZERO,
            max: Vec3::ONE,
        })
    }
}

impl FlowVolume for GpuFlowVolume {
    fn resolution(&self) -> UVec3 {
        self.resolution
    }

    fn generate(&mut self, wind: &WindUniforms) {
        let (min, max) = wind.bounds();
        self.min = min;
        self.max = max;

        let uniforms = WindUniforms {
            resolution: self.resolution.to_array(),
            ..*wind
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flow Generate Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Flow Generate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(
                workgroup_count(self.resolution.x, FLOW_WORKGROUP_SIZE),
                workgroup_count(self.resolution.y, FLOW_WORKGROUP_SIZE),
                workgroup_count(self.resolution.z, FLOW_WORKGROUP_SIZE),
            );
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn barrier(&mut self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }

    fn source(&self) -> FlowSource<'_> {
        FlowSource::Texture {
            view: &self.view,
            sampler: &self.sampler,
            min: self.min,
            max: self.max,
        }
    }
}

/// Creates the flow generation pipeline and its bind group layout.
fn create_generate_pipeline(
    device: &wgpu::Device,
) -> Result<(wgpu::ComputePipeline, wgpu::BindGroupLayout), GpuError> {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Flow Generate Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: GpuFlowVolume::FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Flow Generate Pipeline Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = compile_compute(device, "Flow Generate Kernel", &flow_generate_source(), &pipeline_layout)?;
    Ok((pipeline, layout))
}
