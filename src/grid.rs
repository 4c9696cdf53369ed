//! Regular 3D lattice of velocity samples.
//!
//! Nodes sit at `world_min + (x, y, z) * cell_size` with
//! `cell_size = (world_max - world_min) / (resolution - 1)`, so the first and
//! last nodes on each axis lie exactly on the bounds. Storage is x-fastest:
//! `index = z * nx * ny + y * nx + x`.

use glam::{IVec3, UVec3, Vec3};

/// Smallest resolution per axis (two nodes span the bounds).
pub const MIN_GRID_RESOLUTION: u32 = 2;

/// A lattice of velocity samples over an axis-aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFlowField {
    resolution: UVec3,
    world_min: Vec3,
    world_max: Vec3,
    cell_size: Vec3,
    velocities: Vec<Vec3>,
}

impl GridFlowField {
    /// Create a zero-filled lattice.
    ///
    /// Each axis is clamped to at least [`MIN_GRID_RESOLUTION`] nodes and the
    /// bounds are reordered if `world_min > world_max` on an axis.
    pub fn new(resolution: UVec3, world_min: Vec3, world_max: Vec3) -> Self {
        let resolution = resolution.max(UVec3::splat(MIN_GRID_RESOLUTION));
        let (lo, hi) = (world_min.min(world_max), world_min.max(world_max));
        let cell_size = (hi - lo) / (resolution - UVec3::ONE).as_vec3();
        let len = (resolution.x * resolution.y * resolution.z) as usize;
        Self {
            resolution,
            world_min: lo,
            world_max: hi,
            cell_size,
            velocities: vec![Vec3::ZERO; len],
        }
    }

    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    pub fn world_min(&self) -> Vec3 {
        self.world_min
    }

    pub fn world_max(&self) -> Vec3 {
        self.world_max
    }

    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    /// Number of lattice nodes.
    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    /// Raw node velocities in storage order.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn is_valid_index(&self, x: i32, y: i32, z: i32) -> bool {
        let r = self.resolution.as_ivec3();
        x >= 0 && y >= 0 && z >= 0 && x < r.x && y < r.y && z < r.z
    }

    /// Linear storage index. Caller guarantees validity.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let (nx, ny) = (self.resolution.x as usize, self.resolution.y as usize);
        z as usize * nx * ny + y as usize * nx + x as usize
    }

    /// Velocity at a node, or zero for an out-of-range index.
    pub fn velocity(&self, x: i32, y: i32, z: i32) -> Vec3 {
        if !self.is_valid_index(x, y, z) {
            return Vec3::ZERO;
        }
        self.velocities[self.index(x as u32, y as u32, z as u32)]
    }

    /// Overwrite a node. Out-of-range writes are ignored.
    pub fn set_velocity(&mut self, x: i32, y: i32, z: i32, velocity: Vec3) {
        if !self.is_valid_index(x, y, z) {
            return;
        }
        let i = self.index(x as u32, y as u32, z as u32);
        self.velocities[i] = velocity;
    }

    /// World position of a node.
    pub fn node_position(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.world_min + UVec3::new(x, y, z).as_vec3() * self.cell_size
    }

    /// Continuous lattice coordinates of a world position.
    pub fn world_to_grid(&self, position: Vec3) -> Vec3 {
        (position - self.world_min) / self.cell_size
    }

    /// Whether `position` lies inside the lattice bounds (inclusive).
    pub fn contains(&self, position: Vec3) -> bool {
        position.cmpge(self.world_min).all() && position.cmple(self.world_max).all()
    }

    /// Fill every node from `f(x, y, z, world_position)`.
    pub fn fill_with(&mut self, mut f: impl FnMut(UVec3, Vec3) -> Vec3) {
        let r = self.resolution;
        for z in 0..r.z {
            for y in 0..r.y {
                for x in 0..r.x {
                    let pos = self.node_position(x, y, z);
                    let i = self.index(x, y, z);
                    self.velocities[i] = f(UVec3::new(x, y, z), pos);
                }
            }
        }
    }

    /// Trilinear blend of the eight nodes around `position`.
    ///
    /// Corner indices are clamped to the lattice and weights to `[0, 1]`, so
    /// positions outside the bounds read the nearest face. Exact at nodes.
    pub fn trilinear_interpolate(&self, position: Vec3) -> Vec3 {
        let grid_pos = self.world_to_grid(position);
        let max_index = self.resolution.as_ivec3() - IVec3::ONE;

        let base = grid_pos.floor().as_ivec3();
        let i0 = base.clamp(IVec3::ZERO, max_index);
        let i1 = (base + IVec3::ONE).clamp(IVec3::ZERO, max_index);
        let w = (grid_pos - i0.as_vec3()).clamp(Vec3::ZERO, Vec3::ONE);

        let v000 = self.velocity(i0.x, i0.y, i0.z);
        let v100 = self.velocity(i1.x, i0.y, i0.z);
        let v010 = self.velocity(i0.x, i1.y, i0.z);
        let v110 = self.velocity(i1.x, i1.y, i0.z);
        let v001 = self.velocity(i0.x, i0.y, i1.z);
        let v101 = self.velocity(i1.x, i0.y, i1.z);
        let v011 = self.velocity(i0.x, i1.y, i1.z);
        let v111 = self.velocity(i1.x, i1.y, i1.z);

        let v00 = v000.lerp(v100, w.x);
        let v10 = v010.lerp(v110, w.x);
        let v01 = v001.lerp(v101, w.x);
        let v11 = v011.lerp(v111, w.x);

        let v0 = v00.lerp(v10, w.y);
        let v1 = v01.lerp(v11, w.y);

        v0.lerp(v1, w.z)
    }
}
