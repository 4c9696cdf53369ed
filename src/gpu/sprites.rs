//! Instanced sprite quads for sorted smoke particles.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::GpuContext;
use crate::render::{SpriteSink, SpriteVertex};
use crate::shaders::SPRITE_SHADER;
use crate::textures::SpriteTexture;

/// Sprite shader uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteUniforms {
    pub projection: [[f32; 4]; 4],
    /// Half-width of a fresh sprite in view units.
    pub size: f32,
    pub opacity: f32,
    /// Extra size at the end of life, as a multiple of `size`.
    pub growth: f32,
    pub _pad: f32,
}

impl Default for SpriteUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            size: 0.6,
            opacity: 0.35,
            growth: 2.0,
            _pad: 0.0,
        }
    }
}

const INITIAL_INSTANCES: u64 = 1024;

/// Draws one camera-facing, alpha-blended quad per [`SpriteVertex`].
///
/// Vertices must arrive farthest first (see
/// [`SortedSpriteRenderer`](crate::render::SortedSpriteRenderer)); depth
/// testing is optional and never writes depth.
pub struct SpritePipeline {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniforms: SpriteUniforms,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u64,
    instance_count: u32,
}

impl SpritePipeline {
    pub fn new(
        ctx: &GpuContext,
        format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        texture: &SpriteTexture,
    ) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes = [
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32,
                offset: 12,
                shader_location: 1,
            },
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: SpriteVertex::SIZE,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &attributes,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniforms = SpriteUniforms::default();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Uniforms"),
            size: std::mem::size_of::<SpriteUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let instance_buffer = create_instance_buffer(device, INITIAL_INSTANCES);

        let view = upload_texture(device, &ctx.queue, texture);
        let bind_group = create_bind_group(device, &bind_group_layout, &uniform_buffer, &view, &sampler);

        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            pipeline,
            bind_group_layout,
            bind_group,
            sampler,
            uniform_buffer,
            uniforms,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCES,
            instance_count: 0,
        }
    }

    pub fn uniforms(&self) -> &SpriteUniforms {
        &self.uniforms
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.uniforms.projection = projection.to_cols_array_2d();
        self.write_uniforms();
    }

    /// Base size, opacity and age growth. Negative values clamp to zero,
    /// opacity to `[0, 1]`.
    pub fn set_appearance(&mut self, size: f32, opacity: f32, growth: f32) {
        self.uniforms.size = size.max(0.0);
        self.uniforms.opacity = opacity.clamp(0.0, 1.0);
        self.uniforms.growth = growth.max(0.0);
        self.write_uniforms();
    }

    /// Swap the sprite mask.
    pub fn set_texture(&mut self, texture: &SpriteTexture) {
        let view = upload_texture(&self.device, &self.queue, texture);
        self.bind_group = create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &view,
            &self.sampler,
        );
    }

    /// Sprites uploaded by the last [`SpriteSink::upload`].
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
        pass.draw(0..6, 0..self.instance_count);
    }

    fn write_uniforms(&self) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }
}

impl SpriteSink for SpritePipeline {
    fn upload(&mut self, vertices: &[SpriteVertex]) {
        let needed = vertices.len() as u64;
        if needed > self.instance_capacity {
            let capacity = needed.next_power_of_two();
            log::debug!("growing sprite buffer to {} instances", capacity);
            self.instance_buffer = create_instance_buffer(&self.device, capacity);
            self.instance_capacity = capacity;
        }
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(vertices));
        }
        self.instance_count = vertices.len() as u32;
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Sprite Instances"),
        size: capacity * SpriteVertex::SIZE,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &SpriteTexture,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: texture.width,
        height: texture.height,
        depth_or_array_layers: 1,
    };
    let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Sprite Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &gpu_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &texture.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * texture.width),
            rows_per_image: Some(texture.height),
        },
        size,
    );
    gpu_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Sprite Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_layout() {
        // mat4x4 + four scalars, 16-byte aligned
        assert_eq!(std::mem::size_of::<SpriteUniforms>(), 80);
    }

    #[test]
    fn test_default_projection_is_identity() {
        let u = SpriteUniforms::default();
        assert_eq!(Mat4::from_cols_array_2d(&u.projection), Mat4::IDENTITY);
        assert!(u.opacity > 0.0 && u.opacity <= 1.0);
    }
}
