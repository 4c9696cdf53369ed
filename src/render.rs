//! Back-to-front sprite ordering.
//!
//! Alpha-blended smoke has to be drawn farthest first. Each frame the
//! renderer transforms live particles into view space, sorts them by view
//! depth and hands the ordered vertices to a [`SpriteSink`] (the GPU sprite
//! pipeline in [`crate::gpu::SpritePipeline`], or anything else that consumes
//! them).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::particle::Particle;

/// One render-ready sprite: view-space center plus age in `[0, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub view_position: [f32; 3],
    pub normalized_age: f32,
}

impl SpriteVertex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn depth(&self) -> f32 {
        self.view_position[2]
    }
}

/// Consumer of sorted sprites.
pub trait SpriteSink {
    /// Replace the sink's contents with `vertices` (already in draw order).
    fn upload(&mut self, vertices: &[SpriteVertex]);
}

impl SpriteSink for Vec<SpriteVertex> {
    fn upload(&mut self, vertices: &[SpriteVertex]) {
        self.clear();
        self.extend_from_slice(vertices);
    }
}

/// Projects, sorts and streams particles for alpha-blended drawing.
#[derive(Debug, Default)]
pub struct SortedSpriteRenderer {
    vertices: Vec<SpriteVertex>,
}

impl SortedSpriteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build this frame's vertex list, ordered by view-space z ascending.
    ///
    /// With a right-handed view the camera looks down -z, so ascending z is
    /// farthest first. Equal depths keep no particular order.
    pub fn prepare(&mut self, particles: &[Particle], view: &Mat4) -> &[SpriteVertex] {
        self.vertices.clear();
        self.vertices.extend(particles.iter().map(|p| {
            let v: Vec3 = view.transform_point3(p.position);
            SpriteVertex {
                view_position: v.to_array(),
                normalized_age: p.normalized_age(),
            }
        }));
        self.vertices
            .sort_unstable_by(|a, b| a.depth().total_cmp(&b.depth()));
        &self.vertices
    }

    /// Vertices from the last [`SortedSpriteRenderer::prepare`].
    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    /// Stream the last prepared vertices into `sink`.
    pub fn submit(&self, sink: &mut impl SpriteSink) {
        sink.upload(&self.vertices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_z(z: f32, age: f32) -> Particle {
        let mut p = Particle::new(Vec3::new(0.0, 0.0, z), Vec3::ZERO, 2.0);
        p.age = age;
        p
    }

    #[test]
    fn test_sorted_by_view_depth() {
        let particles = [at_z(5.0, 0.2), at_z(-3.0, 1.0), at_z(1.0, 2.0)];
        let mut r = SortedSpriteRenderer::new();
        let out = r.prepare(&particles, &Mat4::IDENTITY);
        let depths: Vec<f32> = out.iter().map(|v| v.depth()).collect();
        assert_eq!(depths, vec![-3.0, 1.0, 5.0]);
        let ages: Vec<f32> = out.iter().map(|v| v.normalized_age).collect();
        assert_eq!(ages, vec![0.5, 1.0, 0.1]);
    }

    #[test]
    fn test_view_transform_applied() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let particles = [at_z(0.0, 0.0), at_z(5.0, 0.0)];
        let mut r = SortedSpriteRenderer::new();
        let out = r.prepare(&particles, &view);
        // farther particle (z = 0 world, 10 units away) first
        assert!((out[0].depth() + 10.0).abs() < 1e-5);
        assert!((out[1].depth() + 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_age_clamped() {
        let mut p = at_z(0.0, 0.0);
        p.age = 9.0;
        let mut r = SortedSpriteRenderer::new();
        assert_eq!(r.prepare(&[p], &Mat4::IDENTITY)[0].normalized_age, 1.0);
    }

    #[test]
    fn test_submit_streams_to_sink() {
        let mut r = SortedSpriteRenderer::new();
        r.prepare(&[at_z(2.0, 0.0), at_z(-1.0, 0.0)], &Mat4::IDENTITY);
        let mut sink: Vec<SpriteVertex> = vec![SpriteVertex::zeroed(); 5];
        r.submit(&mut sink);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].depth(), -1.0);
    }

    #[test]
    fn test_empty_input() {
        let mut r = SortedSpriteRenderer::new();
        assert!(r.prepare(&[], &Mat4::IDENTITY).is_empty());
    }
}
