//! Smoke particle physics.
//!
//! One integrator, shared by the host path ([`integrate`]) and the physics
//! kernel in [`crate::shaders::physics_kernel_source`]. Both compute, per step:
//!
//! ```text
//! damping      = 1 + dt * drag / mass
//! new_velocity = (v + dt * (0, -gravity, 0) + flow * flow_influence * dt) / damping
//! new_position = p + dt * new_velocity
//! ```
//!
//! Drag is solved implicitly, so large `dt * drag / mass` only slows particles
//! down instead of reversing them.
//!
//! The free force functions ([`gravity_force`], [`drag_force`],
//! [`flow_relaxation_force`]) describe the same forces in Newtonian form and
//! are used for diagnostics. The relaxation model pulls velocity toward the
//! flow (`k * m * (flow - v)`) and is *not* what the integrator applies.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Below this speed drag contributes nothing.
pub const MIN_DRAG_SPEED: f32 = 1e-6;

/// Smallest accepted particle mass.
pub const MIN_PARTICLE_MASS: f32 = 1e-3;

/// Physics coefficients shared by host and device.
///
/// Built with the `with_*` setters, which clamp into valid ranges.
///
/// ```ignore
/// let params = PhysicsParameters::new()
///     .with_gravity(2.5)
///     .with_drag(0.8)
///     .with_flow_influence(1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParameters {
    /// Downward acceleration along -Y.
    pub gravity_strength: f32,
    /// Linear drag coefficient, `>= 0`.
    pub drag_coefficient: f32,
    /// Particle mass, `> 0`.
    pub particle_mass: f32,
    /// Scale on the sampled flow velocity, `>= 0`.
    pub flow_influence: f32,
}

impl Default for PhysicsParameters {
    fn default() -> Self {
        Self {
            gravity_strength: 2.5,
            drag_coefficient: 0.8,
            particle_mass: 1.0,
            flow_influence: 1.5,
        }
    }
}

impl PhysicsParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters with every force switched off and unit mass.
    pub fn inert() -> Self {
        Self {
            gravity_strength: 0.0,
            drag_coefficient: 0.0,
            particle_mass: 1.0,
            flow_influence: 0.0,
        }
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity_strength = gravity;
        self
    }

    /// Drag coefficient. Clamped to `>= 0`.
    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag_coefficient = drag.max(0.0);
        self
    }

    /// Particle mass. Clamped to at least [`MIN_PARTICLE_MASS`].
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.particle_mass = mass.max(MIN_PARTICLE_MASS);
        self
    }

    /// Flow coupling. Clamped to `>= 0`.
    pub fn with_flow_influence(mut self, influence: f32) -> Self {
        self.flow_influence = influence.max(0.0);
        self
    }

    /// Implicit damping divisor for a step of `dt`. Mass is floored at
    /// [`MIN_PARTICLE_MASS`], the same floor the kernel uniforms carry.
    #[inline]
    pub fn damping_factor(&self, dt: f32) -> f32 {
        1.0 + dt * self.drag_coefficient / self.particle_mass.max(MIN_PARTICLE_MASS)
    }
}

/// Advance one particle state by `dt`.
///
/// Returns `(new_position, new_velocity)`.
#[inline]
pub fn integrate(
    position: Vec3,
    velocity: Vec3,
    flow_velocity: Vec3,
    params: &PhysicsParameters,
    dt: f32,
) -> (Vec3, Vec3) {
    let gravity_term = Vec3::new(0.0, -params.gravity_strength, 0.0) * dt;
    let flow_term = flow_velocity * params.flow_influence * dt;
    let new_velocity = (velocity + gravity_term + flow_term) / params.damping_factor(dt);
    (position + new_velocity * dt, new_velocity)
}

/// Gravitational force `(0, -g * m, 0)`.
pub fn gravity_force(params: &PhysicsParameters) -> Vec3 {
    Vec3::new(0.0, -params.gravity_strength * params.particle_mass, 0.0)
}

/// Linear drag `-k * v`; zero for (near) stationary particles.
pub fn drag_force(velocity: Vec3, params: &PhysicsParameters) -> Vec3 {
    if velocity.length() < MIN_DRAG_SPEED {
        return Vec3::ZERO;
    }
    -params.drag_coefficient * velocity
}

/// Relaxation of velocity toward the flow: `k * m * (flow - v)`.
///
/// Diagnostic only. [`integrate`] uses additive flow forcing instead.
pub fn flow_relaxation_force(velocity: Vec3, flow_velocity: Vec3, params: &PhysicsParameters) -> Vec3 {
    params.flow_influence * params.particle_mass * (flow_velocity - velocity)
}

/// Sum of gravity, drag and flow relaxation.
pub fn total_force(velocity: Vec3, flow_velocity: Vec3, params: &PhysicsParameters) -> Vec3 {
    gravity_force(params) + drag_force(velocity, params) + flow_relaxation_force(velocity, flow_velocity, params)
}

/// Per-dispatch uniforms for the physics kernel.
///
/// Always derived from [`PhysicsParameters`] through [`StepUniforms::new`];
/// there is no independent device-side parameter set.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct StepUniforms {
    pub delta_time: f32,
    pub time: f32,
    /// Number of occupied slots to process.
    pub total: u32,
    /// 1 when a flow volume is bound.
    pub has_flow: u32,
    pub gravity_strength: f32,
    pub drag_coefficient: f32,
    pub particle_mass: f32,
    pub flow_influence: f32,
    pub flow_min: [f32; 3],
    pub _pad0: f32,
    pub flow_max: [f32; 3],
    pub _pad1: f32,
}

impl StepUniforms {
    pub const WGSL_STRUCT: &'static str = r#"struct StepUniforms {
    delta_time: f32,
    time: f32,
    total: u32,
    has_flow: u32,
    gravity_strength: f32,
    drag_coefficient: f32,
    particle_mass: f32,
    flow_influence: f32,
    flow_min: vec3<f32>,
    _pad0: f32,
    flow_max: vec3<f32>,
    _pad1: f32,
};
"#;

    pub fn new(params: &PhysicsParameters, delta_time: f32, time: f32, total: u32) -> Self {
        Self {
            delta_time,
            time,
            total,
            has_flow: 0,
            gravity_strength: params.gravity_strength,
            drag_coefficient: params.drag_coefficient,
            particle_mass: params.particle_mass.max(MIN_PARTICLE_MASS),
            flow_influence: params.flow_influence,
            flow_min: [0.0; 3],
            _pad0: 0.0,
            flow_max: [0.0; 3],
            _pad1: 0.0,
        }
    }

    /// Mark a flow volume covering `[min, max]` as bound.
    pub fn with_flow(mut self, min: Vec3, max: Vec3) -> Self {
        self.has_flow = 1;
        self.flow_min = min.to_array();
        self.flow_max = max.to_array();
        self
    }

    /// Parameters this uniform block was derived from.
    pub fn parameters(&self) -> PhysicsParameters {
        PhysicsParameters {
            gravity_strength: self.gravity_strength,
            drag_coefficient: self.drag_coefficient,
            particle_mass: self.particle_mass,
            flow_influence: self.flow_influence,
        }
    }
}
