//! WGSL sources for the physics kernel, the flow generator and the sprite
//! renderer.
//!
//! Struct declarations are spliced in from the Rust types that mirror them
//! ([`ParticleGpu::WGSL_STRUCT`], [`StepUniforms::WGSL_STRUCT`],
//! [`WindUniforms::WGSL_STRUCT`]) so each layout is written once.

use crate::flow_device::WindUniforms;
use crate::particle::ParticleGpu;
use crate::physics::StepUniforms;

/// Threads per group in the physics kernel.
pub const PHYSICS_WORKGROUP_SIZE: u32 = 64;

/// Threads per axis in the flow generator (4x4x4 groups).
pub const FLOW_WORKGROUP_SIZE: u32 = 4;

const PHYSICS_BODY: &str = r#"
struct Counters {
    alive: atomic<u32>,
    dead: atomic<u32>,
    total: u32,
    _pad: u32,
};

@group(0) @binding(0) var<storage, read_write> particles: array<Particle>;
@group(0) @binding(1) var<storage, read_write> counters: Counters;
@group(0) @binding(2) var<uniform> params: StepUniforms;
@group(0) @binding(3) var flow_texture: texture_3d<f32>;
@group(0) @binding(4) var flow_sampler: sampler;

// Texel centers sit on lattice nodes: node i of n maps to (i + 0.5) / n.
fn sample_flow(pos: vec3<f32>) -> vec3<f32> {
    if (params.has_flow == 0u) {
        return vec3<f32>(0.0);
    }
    if (any(pos < params.flow_min) || any(pos > params.flow_max)) {
        return vec3<f32>(0.0);
    }
    let dims = vec3<f32>(textureDimensions(flow_texture));
    let extent = max(params.flow_max - params.flow_min, vec3<f32>(1e-6));
    let grid_pos = (pos - params.flow_min) / extent * (dims - 1.0);
    let uvw = (grid_pos + 0.5) / dims;
    return textureSampleLevel(flow_texture, flow_sampler, uvw, 0.0).xyz;
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= params.total) {
        return;
    }

    var p = particles[i];
    if (p.state == 0u) {
        atomicAdd(&counters.dead, 1u);
        return;
    }

    let dt = params.delta_time;
    let damping = 1.0 + dt * params.drag_coefficient / params.particle_mass;
    let gravity = vec3<f32>(0.0, -params.gravity_strength, 0.0) * dt;
    let flow = sample_flow(p.position) * params.flow_influence * dt;

    p.velocity = (p.velocity + gravity + flow) / damping;
    p.position = p.position + p.velocity * dt;
    p.age = p.age + dt;

    if (p.age > p.lifespan) {
        p.state = 0u;
        atomicAdd(&counters.dead, 1u);
    } else {
        atomicAdd(&counters.alive, 1u);
    }

    particles[i] = p;
}
"#;

const FLOW_GENERATE_BODY: &str = r#"
@group(0) @binding(0) var<uniform> wind: WindUniforms;
@group(0) @binding(1) var flow_out: texture_storage_3d<rgba16float, write>;

@compute @workgroup_size(4, 4, 4)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (any(id >= wind.resolution)) {
        return;
    }
    let ny = max(wind.resolution.y, 2u);
    let h = clamp(f32(id.y) / f32(ny - 1u), 0.0, 1.0);
    let pulse = 1.0 + 0.1 * sin(wind.time * wind.time_scale);
    let v = wind.direction * wind.strength * (1.0 - wind.height_variation * h) * pulse;
    textureStore(flow_out, id, vec4<f32>(v, 0.0));
}
"#;

/// Point-sprite renderer: one camera-facing quad per instance.
pub const SPRITE_SHADER: &str = r#"
struct SpriteUniforms {
    projection: mat4x4<f32>,
    size: f32,
    opacity: f32,
    growth: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> sprite: SpriteUniforms;
@group(0) @binding(1) var sprite_texture: texture_2d<f32>;
@group(0) @binding(2) var sprite_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) age: f32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) view_position: vec3<f32>,
    @location(1) normalized_age: f32,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index];

    // puffs grow as they age
    let size = sprite.size * (1.0 + sprite.growth * normalized_age);
    let pos = view_position + vec3<f32>(corner * size, 0.0);

    var out: VertexOutput;
    out.clip_position = sprite.projection * vec4<f32>(pos, 1.0);
    out.uv = corner * 0.5 + 0.5;
    out.age = normalized_age;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tex = textureSample(sprite_texture, sprite_sampler, in.uv);
    let shade = mix(0.85, 0.45, in.age);
    let alpha = tex.a * sprite.opacity * (1.0 - in.age);
    return vec4<f32>(vec3<f32>(shade) * tex.rgb, alpha);
}
"#;

/// Physics kernel: integrate, age and tag every occupied slot.
pub fn physics_kernel_source() -> String {
    format!(
        "{}\n{}\n{}",
        ParticleGpu::WGSL_STRUCT,
        StepUniforms::WGSL_STRUCT,
        PHYSICS_BODY
    )
}

/// Flow generator: writes the wind lattice into a 3D storage texture.
pub fn flow_generate_source() -> String {
    format!("{}\n{}", WindUniforms::WGSL_STRUCT, FLOW_GENERATE_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL using naga.
    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    #[test]
    fn test_physics_kernel_validates() {
        let src = physics_kernel_source();
        if let Err(e) = validate_wgsl(&src) {
            panic!("physics kernel failed validation:\n{}\n\nSource:\n{}", e, src);
        }
    }

    #[test]
    fn test_flow_generator_validates() {
        let src = flow_generate_source();
        if let Err(e) = validate_wgsl(&src) {
            panic!("flow generator failed validation:\n{}\n\nSource:\n{}", e, src);
        }
    }

    #[test]
    fn test_sprite_shader_validates() {
        if let Err(e) = validate_wgsl(SPRITE_SHADER) {
            panic!("sprite shader failed validation:\n{}", e);
        }
    }

    #[test]
    fn test_workgroup_sizes_match_sources() {
        assert!(PHYSICS_BODY.contains(&format!("@workgroup_size({})", PHYSICS_WORKGROUP_SIZE)));
        let w = FLOW_WORKGROUP_SIZE;
        assert!(FLOW_GENERATE_BODY.contains(&format!("@workgroup_size({}, {}, {})", w, w, w)));
    }
}
