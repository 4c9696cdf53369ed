//! Smoke emitter.
//!
//! Spawns a fixed number of particles per frame on a disk just above the
//! floor of the [`BoundaryVolume`], each launched inside a cone around the
//! emission direction.
//!
//! # Example
//!
//! ```ignore
//! let emitter = ConeEmitter::new()
//!     .with_rate(64)
//!     .with_spread(22.5_f32.to_radians())
//!     .with_speed(10.0, 0.3)
//!     .with_lifespan(5.0);
//!
//! for p in emitter.emit(&boundary, &mut rng) {
//!     store.spawn(p);
//! }
//! ```

use glam::{Quat, Vec3};

use crate::boundary::BoundaryVolume;
use crate::particle::Particle;
use crate::random::UniformSource;

/// Cone-shaped particle source.
#[derive(Clone, Debug, PartialEq)]
pub struct ConeEmitter {
    /// Particles emitted per frame.
    pub rate: u32,
    /// Axis of the cone (normalized).
    pub direction: Vec3,
    /// Cone half-angle in radians.
    pub spread: f32,
    /// Base launch speed.
    pub speed: f32,
    /// Relative speed jitter; 0.3 means +-30%.
    pub speed_variation: f32,
    /// Lifespan given to every particle.
    pub lifespan: f32,
    /// Radius of the spawn disk.
    pub spawn_radius: f32,
}

impl Default for ConeEmitter {
    fn default() -> Self {
        Self {
            rate: 64,
            direction: Vec3::Y,
            spread: 22.5_f32.to_radians(),
            speed: 10.0,
            speed_variation: 0.3,
            lifespan: 5.0,
            spawn_radius: 2.0,
        }
    }
}

impl ConeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, per_frame: u32) -> Self {
        self.rate = per_frame;
        self
    }

    /// Emission axis. A zero vector keeps the current axis.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        if let Some(dir) = direction.try_normalize() {
            self.direction = dir;
        }
        self
    }

    /// Half-angle, clamped to `[0, PI]`.
    pub fn with_spread(mut self, half_angle: f32) -> Self {
        self.spread = half_angle.clamp(0.0, std::f32::consts::PI);
        self
    }

    /// Base speed and relative variation (variation clamped to `[0, 1]`).
    pub fn with_speed(mut self, speed: f32, variation: f32) -> Self {
        self.speed = speed.max(0.0);
        self.speed_variation = variation.clamp(0.0, 1.0);
        self
    }

    pub fn with_lifespan(mut self, lifespan: f32) -> Self {
        self.lifespan = lifespan.max(0.0);
        self
    }

    pub fn with_spawn_radius(mut self, radius: f32) -> Self {
        self.spawn_radius = radius.max(0.0);
        self
    }

    /// A random launch direction inside the cone.
    ///
    /// `cos(theta)` is drawn uniformly from `[cos(spread), 1]`, which spreads
    /// directions evenly over the spherical cap.
    pub fn sample_direction(&self, rng: &mut impl UniformSource) -> Vec3 {
        let cos_theta = rng.uniform(self.spread.cos(), 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = rng.uniform(0.0, std::f32::consts::TAU);
        let local = Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin());
        Quat::from_rotation_arc(Vec3::Y, self.direction) * local
    }

    /// One freshly spawned particle.
    pub fn sample(&self, boundary: &BoundaryVolume, rng: &mut impl UniformSource) -> Particle {
        let position = boundary.sample_spawn_point(self.spawn_radius, rng);
        let direction = self.sample_direction(rng);
        let jitter = rng.uniform(-self.speed_variation, self.speed_variation);
        let speed = self.speed * (1.0 + jitter);
        Particle::new(position, direction * speed, self.lifespan)
    }

    /// This frame's batch of [`ConeEmitter::rate`] particles.
    pub fn emit<'a, R: UniformSource>(
        &'a self,
        boundary: &'a BoundaryVolume,
        rng: &'a mut R,
    ) -> impl Iterator<Item = Particle> + 'a {
        (0..self.rate).map(move |_| self.sample(boundary, &mut *rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_matches_smoke_column() {
        let e = ConeEmitter::default();
        assert_eq!(e.rate, 64);
        assert!((e.spread - std::f32::consts::PI / 8.0).abs() < 1e-6);
        assert_eq!(e.lifespan, 5.0);
    }

    #[test]
    fn test_directions_inside_cone() {
        let e = ConeEmitter::new().with_spread(0.4);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let d = e.sample_direction(&mut rng);
            assert!((d.length() - 1.0).abs() < 1e-4);
            assert!(d.dot(Vec3::Y) >= 0.4_f32.cos() - 1e-4);
        }
    }

    #[test]
    fn test_tilted_cone_follows_direction() {
        let e = ConeEmitter::new().with_direction(Vec3::X).with_spread(0.1);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            assert!(e.sample_direction(&mut rng).dot(Vec3::X) >= 0.1_f32.cos() - 1e-4);
        }
    }

    #[test]
    fn test_speed_within_variation() {
        let e = ConeEmitter::new().with_speed(10.0, 0.3);
        let boundary = BoundaryVolume::default();
        let mut rng = StdRng::seed_from_u64(5);
        for p in e.emit(&boundary, &mut rng) {
            let s = p.velocity.length();
            assert!((7.0 - 1e-3..=13.0 + 1e-3).contains(&s), "speed {}", s);
            assert_eq!(p.age, 0.0);
        }
    }

    #[test]
    fn test_emit_yields_rate_particles() {
        let e = ConeEmitter::new().with_rate(17);
        let boundary = BoundaryVolume::default();
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(e.emit(&boundary, &mut rng).count(), 17);
    }
}
