//! Particle pool on wgpu storage buffers.

use std::sync::Arc;

use bytemuck::Zeroable;

use super::{compile_compute, read_buffer, GpuContext};
use crate::device::{workgroup_count, FlowSource, ParticleCounters, ParticleDevice};
use crate::error::GpuError;
use crate::particle::ParticleGpu;
use crate::physics::StepUniforms;
use crate::shaders::{physics_kernel_source, PHYSICS_WORKGROUP_SIZE};

/// Particle and counter buffers plus the physics kernel.
pub struct GpuParticles {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    capacity: u32,
    particle_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// Bound when no flow volume is available.
    empty_flow_view: wgpu::TextureView,
    empty_flow_sampler: wgpu::Sampler,
}

impl GpuParticles {
    /// Allocate `capacity` slots (at least one) and compile the physics kernel.
    ///
    /// Fails with [`GpuError::CapacityExceeded`] when the pool cannot be bound
    /// or dispatched within the device limits.
    pub fn new(ctx: &GpuContext, capacity: u32) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let capacity = capacity.max(1);
        let limit = max_pool_capacity(&device.limits());
        if capacity > limit {
            return Err(GpuError::CapacityExceeded {
                requested: capacity,
                limit,
            });
        }

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Buffer"),
            size: capacity as u64 * ParticleGpu::SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Counters"),
            size: ParticleCounters::SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Physics Uniforms"),
            size: std::mem::size_of::<StepUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (pipeline, bind_group_layout) = create_physics_pipeline(device)?;

        let empty_flow = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Empty Flow Volume"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let empty_flow_view = empty_flow.create_view(&wgpu::TextureViewDescriptor::default());
        let empty_flow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Empty Flow Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "allocated GPU particle pool: {} slots ({} KiB)",
            capacity,
            capacity as u64 * ParticleGpu::SIZE / 1024
        );

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            capacity,
            particle_buffer,
            counter_buffer,
            uniform_buffer,
            pipeline,
            bind_group_layout,
            empty_flow_view,
            empty_flow_sampler,
        })
    }

    /// The particle storage buffer, for binding in other passes.
    pub fn particle_buffer(&self) -> &wgpu::Buffer {
        &self.particle_buffer
    }
}

/// Largest pool that fits one storage binding and one physics dispatch.
pub fn max_pool_capacity(limits: &wgpu::Limits) -> u32 {
    let by_binding = limits.max_storage_buffer_binding_size as u64 / ParticleGpu::SIZE;
    let by_buffer = limits.max_buffer_size / ParticleGpu::SIZE;
    let by_dispatch = limits.max_compute_workgroups_per_dimension as u64 * PHYSICS_WORKGROUP_SIZE as u64;
    by_binding.min(by_buffer).min(by_dispatch).min(u32::MAX as u64) as u32
}

impl ParticleDevice for GpuParticles {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn write_particles(&mut self, offset: u32, records: &[ParticleGpu]) {
        let start = offset.min(self.capacity) as usize;
        let n = records.len().min(self.capacity as usize - start);
        if n < records.len() {
            log::warn!(
                "dropping {} particle records past capacity {}",
                records.len() - n,
                self.capacity
            );
        }
        if n == 0 {
            return;
        }
        self.queue.write_buffer(
            &self.particle_buffer,
            start as u64 * ParticleGpu::SIZE,
            bytemuck::cast_slice(&records[..n]),
        );
    }

    fn read_particles(&mut self, count: u32) -> Result<Vec<ParticleGpu>, GpuError> {
        let count = count.min(self.capacity) as usize;
        read_buffer(&self.device, &self.queue, &self.particle_buffer, 0, count)
    }

    fn write_counters(&mut self, counters: ParticleCounters) {
        self.queue
            .write_buffer(&self.counter_buffer, 0, bytemuck::bytes_of(&counters));
    }

    fn read_counters(&mut self) -> Result<ParticleCounters, GpuError> {
        let counters: Vec<ParticleCounters> =
            read_buffer(&self.device, &self.queue, &self.counter_buffer, 0, 1)?;
        Ok(counters.first().copied().unwrap_or_else(ParticleCounters::zeroed))
    }

    fn dispatch_physics(&mut self, uniforms: &StepUniforms, flow: Option<FlowSource<'_>>) {
        let (uniforms, view, sampler) = match flow {
            Some(FlowSource::Texture { view, sampler, min, max }) => {
                (uniforms.with_flow(min, max), view, sampler)
            }
            Some(FlowSource::Lattice(_)) => {
                log::warn!("GPU particles cannot sample a host lattice; running without flow");
                let u = StepUniforms { has_flow: 0, ..*uniforms };
                (u, &self.empty_flow_view, &self.empty_flow_sampler)
            }
            None => {
                let u = StepUniforms { has_flow: 0, ..*uniforms };
                (u, &self.empty_flow_view, &self.empty_flow_sampler)
            }
        };

        let total = uniforms.total.min(self.capacity);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let reset = ParticleCounters::new(0, 0, total);
        self.queue
            .write_buffer(&self.counter_buffer, 0, bytemuck::bytes_of(&reset));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Physics Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.counter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Physics Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Physics Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(total, PHYSICS_WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn barrier(&mut self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Creates the physics compute pipeline and its bind group layout.
fn create_physics_pipeline(
    device: &wgpu::Device,
) -> Result<(wgpu::ComputePipeline, wgpu::BindGroupLayout), GpuError> {
    let storage = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Physics Layout"),
        entries: &[
            storage(0),
            storage(1),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Physics Pipeline Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = compile_compute(device, "Physics Kernel", &physics_kernel_source(), &pipeline_layout)?;
    Ok((pipeline, layout))
}
