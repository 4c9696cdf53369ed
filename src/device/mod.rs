//! Device seams for the particle pool and the flow volume.
//!
//! [`ParticleStore`](crate::store::ParticleStore) and
//! [`FlowFieldDevice`](crate::flow_device::FlowFieldDevice) never touch wgpu
//! directly. They drive a [`ParticleDevice`] and a [`FlowVolume`]:
//!
//! - [`crate::gpu`] implements both on wgpu buffers, a 3D storage texture and
//!   WGSL kernels.
//! - [`host`] emulates both on the CPU with the same wire records and the
//!   same kernel arithmetic. Tests and GPU-less machines use it.
//!
//! # Synchronization
//!
//! `dispatch_*` and `generate` only *record* work. Reads of particles or
//! counters are valid after [`ParticleDevice::barrier`], and the flow volume
//! is safe to sample after [`FlowVolume::barrier`].

pub mod host;

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

use crate::error::GpuError;
use crate::flow_device::WindUniforms;
use crate::grid::GridFlowField;
use crate::particle::ParticleGpu;
use crate::physics::StepUniforms;

/// Pool counters shared with the physics kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct ParticleCounters {
    pub alive: u32,
    pub dead: u32,
    /// Occupied slots (highest used index + 1).
    pub total: u32,
    pub _pad: u32,
}

impl ParticleCounters {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(alive: u32, dead: u32, total: u32) -> Self {
        Self {
            alive,
            dead,
            total,
            _pad: 0,
        }
    }
}

/// A flow volume as seen by the physics kernel.
#[derive(Debug, Clone, Copy)]
pub enum FlowSource<'a> {
    /// Filtered 3D texture on the GPU.
    Texture {
        view: &'a wgpu::TextureView,
        sampler: &'a wgpu::Sampler,
        min: Vec3,
        max: Vec3,
    },
    /// CPU lattice sampled trilinearly.
    Lattice(&'a GridFlowField),
}

impl FlowSource<'_> {
    /// World extent covered by the volume.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        match self {
            FlowSource::Texture { min, max, .. } => (*min, *max),
            FlowSource::Lattice(grid) => (grid.world_min(), grid.world_max()),
        }
    }
}

/// Storage for the particle pool and the physics kernel that advances it.
pub trait ParticleDevice {
    /// Number of record slots. Fixed at construction.
    fn capacity(&self) -> u32;

    /// Write `records` starting at slot `offset`. Records past
    /// [`ParticleDevice::capacity`] are discarded.
    fn write_particles(&mut self, offset: u32, records: &[ParticleGpu]);

    /// Blocking read of the first `count` slots (clamped to capacity).
    fn read_particles(&mut self, count: u32) -> Result<Vec<ParticleGpu>, GpuError>;

    fn write_counters(&mut self, counters: ParticleCounters);

    /// Blocking read of the counters.
    fn read_counters(&mut self) -> Result<ParticleCounters, GpuError>;

    /// Record one physics step over slots `[0, uniforms.total)`.
    ///
    /// The kernel resets alive/dead before counting, integrates alive slots,
    /// ages them, and tags those past their lifespan dead. A `flow` the device
    /// cannot bind is ignored.
    fn dispatch_physics(&mut self, uniforms: &StepUniforms, flow: Option<FlowSource<'_>>);

    /// Wait until all recorded work is complete and visible to reads.
    fn barrier(&mut self);
}

/// A 3D lattice of velocities regenerated by a kernel.
pub trait FlowVolume {
    fn resolution(&self) -> UVec3;

    /// Record a full regeneration from wind parameters.
    fn generate(&mut self, wind: &WindUniforms);

    /// Wait until the last generation is visible to samplers.
    fn barrier(&mut self);

    /// Sampling handle for the physics kernel.
    fn source(&self) -> FlowSource<'_>;
}

/// Dispatch count covering `n` items with groups of `group`.
#[inline]
pub fn workgroup_count(n: u32, group: u32) -> u32 {
    n.div_ceil(group.max(1))
}
