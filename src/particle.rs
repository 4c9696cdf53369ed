//! Particle records.
//!
//! Two representations share the same fields:
//!
//! - [`Particle`] is the host-side value that spawners, the host integrator and
//!   the renderer work with.
//! - [`ParticleGpu`] is the 48-byte wire record stored in device particle
//!   buffers. Its layout matches `struct Particle` in [`ParticleGpu::WGSL_STRUCT`].
//!
//! Liveness on the device is an explicit [`ParticleState`] tag rather than a
//! sentinel age. A zero-filled slot decodes as [`ParticleState::Dead`].

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// A simulated smoke particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Seconds since spawn.
    pub age: f32,
    /// Seconds the particle lives for.
    pub lifespan: f32,
}

impl Particle {
    /// Create a freshly spawned particle (`age = 0`).
    ///
    /// Negative lifespans are clamped to zero.
    pub fn new(position: Vec3, velocity: Vec3, lifespan: f32) -> Self {
        Self {
            position,
            velocity,
            age: 0.0,
            lifespan: lifespan.max(0.0),
        }
    }

    /// A particle is alive while `age <= lifespan`.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.age <= self.lifespan
    }

    /// Age as a fraction of lifespan, clamped to `[0, 1]`.
    pub fn normalized_age(&self) -> f32 {
        if self.lifespan > 0.0 {
            (self.age / self.lifespan).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Liveness tag stored in [`ParticleGpu::state`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleState {
    Dead = 0,
    Alive = 1,
}

impl From<u32> for ParticleState {
    fn from(v: u32) -> Self {
        if v == ParticleState::Alive as u32 {
            ParticleState::Alive
        } else {
            ParticleState::Dead
        }
    }
}

/// Device-side particle record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleGpu {
    pub position: [f32; 3],
    pub age: f32,
    pub velocity: [f32; 3],
    pub lifespan: f32,
    pub state: u32,
    pub _pad: [u32; 3],
}

impl ParticleGpu {
    /// Size of one record in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// WGSL declaration with the same layout.
    pub const WGSL_STRUCT: &'static str = r#"struct Particle {
    position: vec3<f32>,
    age: f32,
    velocity: vec3<f32>,
    lifespan: f32,
    state: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};
"#;

    pub fn state(&self) -> ParticleState {
        ParticleState::from(self.state)
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ParticleState::Alive
    }

    /// Convert back to a host particle. The liveness tag is dropped; callers
    /// filter on [`ParticleGpu::is_alive`] first.
    pub fn to_particle(&self) -> Particle {
        Particle {
            position: Vec3::from_array(self.position),
            velocity: Vec3::from_array(self.velocity),
            age: self.age,
            lifespan: self.lifespan,
        }
    }
}

impl From<&Particle> for ParticleGpu {
    fn from(p: &Particle) -> Self {
        let state = if p.is_alive() {
            ParticleState::Alive
        } else {
            ParticleState::Dead
        };
        Self {
            position: p.position.to_array(),
            age: p.age,
            velocity: p.velocity.to_array(),
            lifespan: p.lifespan,
            state: state as u32,
            _pad: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_48_bytes() {
        assert_eq!(ParticleGpu::SIZE, 48);
        assert_eq!(std::mem::align_of::<ParticleGpu>(), 4);
    }

    #[test]
    fn test_zeroed_slot_is_dead() {
        let slot = ParticleGpu::zeroed();
        assert_eq!(slot.state(), ParticleState::Dead);
        assert!(!slot.is_alive());
    }

    #[test]
    fn test_new_particle_starts_alive() {
        let p = Particle::new(Vec3::ONE, Vec3::Y, 2.0);
        assert_eq!(p.age, 0.0);
        assert!(p.is_alive());
        assert!(ParticleGpu::from(&p).is_alive());
    }

    #[test]
    fn test_alive_boundary_is_inclusive() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO, 1.0);
        p.age = 1.0;
        assert!(p.is_alive());
        p.age = 1.0001;
        assert!(!p.is_alive());
        assert_eq!(ParticleGpu::from(&p).state(), ParticleState::Dead);
    }

    #[test]
    fn test_negative_lifespan_clamped() {
        let p = Particle::new(Vec3::ZERO, Vec3::ZERO, -3.0);
        assert_eq!(p.lifespan, 0.0);
        assert!(p.is_alive());
    }

    #[test]
    fn test_normalized_age() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO, 4.0);
        p.age = 1.0;
        assert!((p.normalized_age() - 0.25).abs() < 1e-6);
        p.age = 10.0;
        assert_eq!(p.normalized_age(), 1.0);
    }

    #[test]
    fn test_gpu_conversion_keeps_fields() {
        let mut p = Particle::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0), 5.0);
        p.age = 0.75;
        let back = ParticleGpu::from(&p).to_particle();
        assert_eq!(back, p);
    }
}
