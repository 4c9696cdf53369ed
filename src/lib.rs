//! # plume - GPU-resident smoke particles
//!
//! A fixed-capacity particle pool that is spawned on the host, advanced by a
//! compute kernel directly on GPU buffers, periodically compacted, pushed
//! around by a 3D flow field, and finally depth-sorted for alpha-blended
//! sprite rendering.
//!
//! ## Quick Start
//!
//! ```ignore
//! use plume::prelude::*;
//!
//! init_logging(LoggingConfig::default());
//! let ctx = GpuContext::headless()?;
//! let mut smoke = SmokeSystem::gpu(&ctx, &SmokeConfig::default());
//! let mut clock = FrameClock::new();
//! let mut rng = rand::thread_rng();
//!
//! loop {
//!     let tick = clock.tick();
//!     let stats = smoke.frame(tick.delta, tick.time, &mut rng, &camera.view_matrix());
//!     smoke.submit(&mut sprites);
//! }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Where |
//! |-------|-------|
//! | Spawn into a staging queue | [`ParticleStore::spawn`], [`ConeEmitter`] |
//! | Upload to the tail of the pool | [`ParticleStore::commit`] |
//! | Regenerate the flow volume | [`FlowFieldDevice::update`] |
//! | Integrate, age, tag dead slots | [`ParticleStore::advance`], [`physics`] |
//! | Reclaim dead slots | [`ParticleStore::maybe_compact`] |
//! | Read back and depth-sort | [`ParticleStore::sync_for_render`], [`SortedSpriteRenderer`] |
//! | Draw | [`gpu::SpritePipeline`] |
//!
//! ## Device seams
//!
//! The store and the flow volume talk to a [`device::ParticleDevice`] and a
//! [`device::FlowVolume`]. [`gpu`] implements them on wgpu; [`device::host`]
//! emulates them on the CPU with the same wire records and arithmetic, which
//! is what the tests run on.

pub mod boundary;
pub mod device;
pub mod emitter;
pub mod error;
pub mod flow;
pub mod flow_device;
pub mod gpu;
pub mod grid;
pub mod logging;
pub mod noise;
pub mod particle;
pub mod physics;
pub mod random;
pub mod render;
pub mod shaders;
pub mod simulation;
pub mod store;
pub mod textures;
pub mod time;

pub use bytemuck;
pub use glam::{Mat4, UVec3, Vec3};

pub use boundary::{BoundaryVolume, BoundingBox};
pub use emitter::ConeEmitter;
pub use error::{DemoError, GpuError, TextureError};
pub use flow::{FlowField, FlowFieldKind, FlowFieldParameters};
pub use flow_device::{FlowFieldDevice, WindParameters};
pub use grid::GridFlowField;
pub use logging::{init_logging, LoggingConfig};
pub use particle::{Particle, ParticleGpu, ParticleState};
pub use physics::PhysicsParameters;
pub use random::UniformSource;
pub use render::{SortedSpriteRenderer, SpriteSink, SpriteVertex};
pub use simulation::{DevicePreference, FrameStats, SmokeConfig, SmokeSystem};
pub use store::{CompactionPolicy, ParticleStore, StepEnvironment};
pub use textures::SpriteTexture;
pub use time::FrameClock;

/// Everything a typical smoke application needs.
pub mod prelude {
    pub use crate::boundary::{BoundaryVolume, BoundingBox};
    pub use crate::emitter::ConeEmitter;
    pub use crate::flow::{FlowField, FlowFieldKind, FlowFieldParameters};
    pub use crate::flow_device::{FlowFieldDevice, WindParameters};
    pub use crate::gpu::{Camera, GpuContext, SpritePipeline};
    pub use crate::logging::{init_logging, LoggingConfig};
    pub use crate::particle::Particle;
    pub use crate::physics::PhysicsParameters;
    pub use crate::render::{SortedSpriteRenderer, SpriteSink};
    pub use crate::simulation::{DevicePreference, FrameStats, SmokeConfig, SmokeSystem};
    pub use crate::store::{CompactionPolicy, ParticleStore};
    pub use crate::textures::SpriteTexture;
    pub use crate::time::FrameClock;
    pub use crate::{Mat4, UVec3, Vec3};
}
