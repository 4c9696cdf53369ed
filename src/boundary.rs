//! Axis-aligned containment volume.
//!
//! The box does three jobs: it reflects particles that reach a face (host
//! simulation only), it picks spawn points on a disk just above its floor,
//! and its extent sizes the device flow volume.

use glam::Vec3;

use crate::particle::Particle;
use crate::random::UniformSource;

/// Spawn points sit this far inside the box.
pub const SPAWN_INSET: f32 = 0.1;

/// An axis-aligned box given by center and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    center: Vec3,
    size: Vec3,
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    /// Sizes are made positive (absolute value per axis).
    pub fn new(center: Vec3, size: Vec3) -> Self {
        let size = size.abs();
        Self {
            center,
            size,
            min: center - size * 0.5,
            max: center + size * 0.5,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn set_center(&mut self, center: Vec3) {
        *self = Self::new(center, self.size);
    }

    pub fn set_size(&mut self, size: Vec3) {
        *self = Self::new(self.center, size);
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Box grown by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.center, self.size + Vec3::splat(2.0 * margin))
    }

    /// Corner positions and 24 line-list indices for drawing the box edges.
    pub fn wireframe(&self) -> ([Vec3; 8], [u16; 24]) {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ];
        let indices = [
            0, 1, 1, 2, 2, 3, 3, 0, // back
            4, 5, 5, 6, 6, 7, 7, 4, // front
            0, 4, 1, 5, 2, 6, 3, 7, // sides
        ];
        (corners, indices)
    }
}

/// The containment box used by a smoke system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryVolume {
    bounds: BoundingBox,
}

impl Default for BoundaryVolume {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 50.0, 0.0), Vec3::new(10.0, 20.0, 10.0))
    }
}

impl BoundaryVolume {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self {
            bounds: BoundingBox::new(center, size),
        }
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Move/resize the box. Min and max update immediately.
    pub fn set_boundary(&mut self, center: Vec3, size: Vec3) {
        self.bounds = BoundingBox::new(center, size);
    }

    /// Reflect a particle that reached a face.
    ///
    /// On each axis a position at or past a face is clamped onto it and the
    /// velocity component is pointed back inward. Returns whether any axis
    /// collided.
    pub fn resolve_collision(&self, particle: &mut Particle) -> bool {
        let (min, max) = (self.bounds.min, self.bounds.max);
        let mut collided = false;
        for axis in 0..3 {
            if particle.position[axis] <= min[axis] {
                particle.position[axis] = min[axis];
                particle.velocity[axis] = particle.velocity[axis].abs();
                collided = true;
            } else if particle.position[axis] >= max[axis] {
                particle.position[axis] = max[axis];
                particle.velocity[axis] = -particle.velocity[axis].abs();
                collided = true;
            }
        }
        collided
    }

    /// A random point on the disk of `radius` just above the floor.
    ///
    /// Uses `r = sqrt(u) * radius` for an area-uniform disk; x and z are
    /// kept [`SPAWN_INSET`] away from the walls.
    pub fn sample_spawn_point(&self, radius: f32, rng: &mut impl UniformSource) -> Vec3 {
        let (min, max, center) = (self.bounds.min, self.bounds.max, self.bounds.center);
        let angle = rng.uniform(0.0, std::f32::consts::TAU);
        let r = rng.uniform(0.0, 1.0).sqrt() * radius.max(0.0);

        let lo = min + Vec3::splat(SPAWN_INSET);
        let hi = (max - Vec3::splat(SPAWN_INSET)).max(lo);
        Vec3::new(
            (center.x + r * angle.cos()).clamp(lo.x, hi.x),
            min.y + SPAWN_INSET,
            (center.z + r * angle.sin()).clamp(lo.z, hi.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // ========== Box Tests ==========

    #[test]
    fn test_min_max_follow_center_and_size() {
        let mut b = BoundingBox::new(Vec3::new(0.0, 50.0, 0.0), Vec3::new(10.0, 20.0, 10.0));
        assert_eq!(b.min(), Vec3::new(-5.0, 40.0, -5.0));
        assert_eq!(b.max(), Vec3::new(5.0, 60.0, 5.0));
        b.set_center(Vec3::ZERO);
        assert_eq!(b.min(), Vec3::new(-5.0, -10.0, -5.0));
        b.set_size(Vec3::splat(2.0));
        assert_eq!(b.max(), Vec3::ONE);
    }

    #[test]
    fn test_negative_size_made_positive() {
        let b = BoundingBox::new(Vec3::ZERO, Vec3::new(-2.0, 2.0, -4.0));
        assert_eq!(b.size(), Vec3::new(2.0, 2.0, 4.0));
    }

    #[test]
    fn test_wireframe_has_twelve_edges() {
        let b = BoundingBox::new(Vec3::ZERO, Vec3::splat(2.0));
        let (corners, indices) = b.wireframe();
        assert_eq!(indices.len(), 24);
        for pair in indices.chunks(2) {
            let d = corners[pair[1] as usize] - corners[pair[0] as usize];
            // every edge is axis-aligned with length 2
            assert!((d.abs().max_element() - 2.0).abs() < 1e-6);
            assert!((d.abs().element_sum() - 2.0).abs() < 1e-6);
        }
    }

    // ========== Collision Tests ==========

    #[test]
    fn test_collision_below_floor() {
        let v = BoundaryVolume::new(Vec3::ZERO, Vec3::splat(2.0));
        let mut p = Particle::new(Vec3::new(0.0, -1.2, 0.0), Vec3::new(0.0, -3.0, 0.0), 1.0);
        assert!(v.resolve_collision(&mut p));
        assert_eq!(p.position, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(p.velocity, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_collision_on_max_face() {
        let v = BoundaryVolume::new(Vec3::ZERO, Vec3::splat(2.0));
        let mut p = Particle::new(Vec3::new(1.5, 0.0, 1.0), Vec3::new(2.0, 0.0, 0.5), 1.0);
        assert!(v.resolve_collision(&mut p));
        assert_eq!(p.position, Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(p.velocity, Vec3::new(-2.0, 0.0, -0.5));
    }

    #[test]
    fn test_no_collision_inside() {
        let v = BoundaryVolume::new(Vec3::ZERO, Vec3::splat(2.0));
        let mut p = Particle::new(Vec3::splat(0.5), Vec3::ONE, 1.0);
        let before = p;
        assert!(!v.resolve_collision(&mut p));
        assert_eq!(p, before);
    }

    // ========== Spawn Tests ==========

    #[test]
    fn test_spawn_points_on_floor_disk() {
        let v = BoundaryVolume::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let p = v.sample_spawn_point(2.0, &mut rng);
            assert!((p.y - 40.1).abs() < 1e-4);
            let d = Vec3::new(p.x, 0.0, p.z).length();
            assert!(d <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_spawn_points_clamped_inside_walls() {
        let v = BoundaryVolume::new(Vec3::ZERO, Vec3::splat(1.0));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let p = v.sample_spawn_point(10.0, &mut rng);
            assert!(p.x >= -0.4 - 1e-5 && p.x <= 0.4 + 1e-5);
            assert!(p.z >= -0.4 - 1e-5 && p.z <= 0.4 + 1e-5);
        }
    }
}
