//! Smoke system configuration and per-frame driver.
//!
//! [`SmokeConfig`] collects every tunable in one builder; [`SmokeSystem`]
//! owns the pipeline stages and runs them in order once per frame:
//!
//! 1. spawn this frame's emitter batch into the staging queue
//! 2. commit the queue into storage
//! 3. refresh the flow volume (throttled)
//! 4. advance the physics
//! 5. compact when the policy says so
//! 6. synchronize particles for rendering
//! 7. depth-sort them into sprites
//!
//! # Example
//!
//! ```ignore
//! let config = SmokeConfig::new().with_capacity(20_000);
//! let mut smoke = SmokeSystem::gpu(&ctx, &config);
//! let stats = smoke.frame(tick.delta, tick.time, &mut rng, &camera.view_matrix());
//! smoke.submit(&mut sprite_pipeline);
//! ```

use glam::{Mat4, UVec3, Vec3};

use crate::boundary::BoundaryVolume;
use crate::device::host::{HostFlowVolume, HostParticleDevice};
use crate::device::{FlowVolume, ParticleDevice};
use crate::emitter::ConeEmitter;
use crate::flow::{FlowField, FlowFieldKind, FlowFieldParameters};
use crate::flow_device::{FlowFieldDevice, WindParameters, DEFAULT_FLOW_RESOLUTION};
use crate::gpu::{GpuContext, GpuFlowVolume, GpuParticles};
use crate::particle::Particle;
use crate::physics::PhysicsParameters;
use crate::random::UniformSource;
use crate::render::{SortedSpriteRenderer, SpriteSink, SpriteVertex};
use crate::store::{CompactionPolicy, ParticleStore, StepEnvironment};

/// Where particles are simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// CPU integration with boundary collisions and the analytic flow.
    Host,
    /// Compute kernel on the GPU; falls back to host when unavailable.
    #[default]
    Gpu,
}

/// Everything needed to build a [`SmokeSystem`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeConfig {
    pub capacity: u32,
    pub compaction: CompactionPolicy,
    pub physics: PhysicsParameters,
    pub flow_kind: FlowFieldKind,
    pub flow_parameters: FlowFieldParameters,
    pub wind: WindParameters,
    pub boundary_center: Vec3,
    pub boundary_size: Vec3,
    pub emitter: ConeEmitter,
    /// Lattice nodes per axis of the flow volume.
    pub flow_resolution: u32,
    /// Margin added around the boundary for the flow volume.
    pub flow_padding: f32,
    pub device: DevicePreference,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            compaction: CompactionPolicy::default(),
            physics: PhysicsParameters::default(),
            flow_kind: FlowFieldKind::default(),
            flow_parameters: FlowFieldParameters::default(),
            wind: WindParameters::default(),
            boundary_center: Vec3::new(0.0, 50.0, 0.0),
            boundary_size: Vec3::new(10.0, 20.0, 10.0),
            emitter: ConeEmitter::default(),
            flow_resolution: DEFAULT_FLOW_RESOLUTION,
            flow_padding: 0.2,
            device: DevicePreference::default(),
        }
    }
}

impl SmokeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// At least one slot.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_compaction(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    pub fn with_physics(mut self, physics: PhysicsParameters) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_flow(mut self, kind: FlowFieldKind, parameters: FlowFieldParameters) -> Self {
        self.flow_kind = kind;
        self.flow_parameters = parameters;
        self
    }

    pub fn with_wind(mut self, wind: WindParameters) -> Self {
        self.wind = wind;
        self
    }

    /// Size components clamp to a small positive minimum.
    pub fn with_boundary(mut self, center: Vec3, size: Vec3) -> Self {
        self.boundary_center = center;
        self.boundary_size = size.max(Vec3::splat(1e-3));
        self
    }

    pub fn with_emitter(mut self, emitter: ConeEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Clamped to `[2, 256]` nodes per axis.
    pub fn with_flow_resolution(mut self, resolution: u32) -> Self {
        self.flow_resolution = resolution.clamp(2, 256);
        self
    }

    pub fn with_flow_padding(mut self, padding: f32) -> Self {
        self.flow_padding = padding.max(0.0);
        self
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    fn flow_bounds(&self) -> (Vec3, Vec3) {
        let half = self.boundary_size * 0.5 + Vec3::splat(self.flow_padding);
        (self.boundary_center - half, self.boundary_center + half)
    }
}

/// What happened during one [`SmokeSystem::frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Emitted particles accepted into the staging queue.
    pub spawned: u32,
    /// Particles moved from the queue into storage.
    pub committed: u32,
    pub alive: u32,
    pub total: u32,
    pub flow_regenerated: bool,
    pub compacted: bool,
}

/// A complete smoke column: pool, flow, boundary, emitter and sprite sorting.
pub struct SmokeSystem {
    store: ParticleStore,
    flow: FlowField,
    flow_device: Option<FlowFieldDevice>,
    boundary: BoundaryVolume,
    emitter: ConeEmitter,
    physics: PhysicsParameters,
    renderer: SortedSpriteRenderer,
    flow_padding: f32,
}

impl SmokeSystem {
    /// CPU-simulated smoke.
    pub fn host(config: &SmokeConfig) -> Self {
        let store = ParticleStore::host(config.capacity).with_compaction(config.compaction);
        Self::assemble(config, store, None)
    }

    /// Smoke on arbitrary device backends (the host emulation in tests).
    ///
    /// Without a flow volume the particles see no flow.
    pub fn with_devices(
        config: &SmokeConfig,
        particles: Box<dyn ParticleDevice>,
        flow_volume: Option<Box<dyn FlowVolume>>,
    ) -> Self {
        let (min, max) = config.flow_bounds();
        let mut flow_device = match flow_volume {
            Some(volume) => FlowFieldDevice::new(volume, min, max),
            None => FlowFieldDevice::unavailable(min, max),
        };
        flow_device.set_wind(config.wind);
        let store = ParticleStore::device(particles).with_compaction(config.compaction);
        Self::assemble(config, store, Some(flow_device))
    }

    /// Smoke on the host-emulated device.
    pub fn emulated(config: &SmokeConfig) -> Self {
        let resolution = UVec3::splat(config.flow_resolution);
        Self::with_devices(
            config,
            Box::new(HostParticleDevice::new(config.capacity)),
            Some(Box::new(HostFlowVolume::new(resolution))),
        )
    }

    /// GPU-simulated smoke on `ctx`.
    ///
    /// Falls back to [`SmokeSystem::host`] when the particle kernel cannot be
    /// built, and runs without flow when the flow volume cannot.
    pub fn gpu(ctx: &GpuContext, config: &SmokeConfig) -> Self {
        let particles = match GpuParticles::new(ctx, config.capacity) {
            Ok(particles) => particles,
            Err(e) => {
                log::warn!("GPU particles unavailable ({}), simulating on the host", e);
                return Self::host(config);
            }
        };
        let resolution = UVec3::splat(config.flow_resolution);
        let flow_volume: Option<Box<dyn FlowVolume>> = match GpuFlowVolume::new(ctx, resolution) {
            Ok(volume) => Some(Box::new(volume)),
            Err(e) => {
                log::warn!("flow volume unavailable ({}), particles will see no flow", e);
                None
            }
        };
        Self::with_devices(config, Box::new(particles), flow_volume)
    }

    /// Build according to [`SmokeConfig::device`]. `Gpu` without a context
    /// uses the host path.
    pub fn from_config(config: &SmokeConfig, ctx: Option<&GpuContext>) -> Self {
        match (config.device, ctx) {
            (DevicePreference::Gpu, Some(ctx)) => Self::gpu(ctx, config),
            (DevicePreference::Gpu, None) => {
                log::warn!("no GPU context, simulating on the host");
                Self::host(config)
            }
            (DevicePreference::Host, _) => Self::host(config),
        }
    }

    fn assemble(config: &SmokeConfig, store: ParticleStore, flow_device: Option<FlowFieldDevice>) -> Self {
        let boundary = BoundaryVolume::new(config.boundary_center, config.boundary_size);
        let (min, max) = config.flow_bounds();
        let flow = FlowField::new(min, max)
            .with_kind(config.flow_kind)
            .with_parameters(config.flow_parameters);

        log::info!(
            "smoke system: {} slots, {} simulation, flow {:?}",
            store.capacity(),
            if store.is_device() { "device" } else { "host" },
            config.flow_kind
        );

        Self {
            store,
            flow,
            flow_device,
            boundary,
            emitter: config.emitter.clone(),
            physics: config.physics,
            renderer: SortedSpriteRenderer::new(),
            flow_padding: config.flow_padding,
        }
    }

    /// Run one frame and leave the sorted sprites in [`SmokeSystem::sprites`].
    pub fn frame<R: UniformSource>(&mut self, dt: f32, time: f32, rng: &mut R, view: &Mat4) -> FrameStats {
        let mut stats = FrameStats::default();

        for particle in self.emitter.emit(&self.boundary, rng) {
            if self.store.spawn(particle) {
                stats.spawned += 1;
            }
        }
        stats.committed = self.store.commit();

        if let Some(flow_device) = self.flow_device.as_mut() {
            stats.flow_regenerated = flow_device.update(time);
        }

        let mut env = StepEnvironment::new(&self.physics)
            .with_flow(&self.flow)
            .with_boundary(&self.boundary);
        if let Some(flow_device) = self.flow_device.as_ref() {
            env = env.with_flow_device(flow_device);
        }
        self.store.advance(dt, time, &env);
        stats.compacted = self.store.maybe_compact(dt);

        let particles = self.store.sync_for_render();
        self.renderer.prepare(particles, view);

        stats.alive = self.store.alive_count();
        stats.total = self.store.total_count();
        stats
    }

    /// Stream the last frame's sorted sprites into `sink`.
    pub fn submit(&self, sink: &mut impl SpriteSink) {
        self.renderer.submit(sink);
    }

    pub fn sprites(&self) -> &[SpriteVertex] {
        self.renderer.vertices()
    }

    pub fn particles(&self) -> &[Particle] {
        self.store.particles()
    }

    pub fn alive_count(&self) -> u32 {
        self.store.alive_count()
    }

    pub fn total_count(&self) -> u32 {
        self.store.total_count()
    }

    pub fn is_device(&self) -> bool {
        self.store.is_device()
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Direct access for explicit spawn / commit / advance / compact calls.
    pub fn store_mut(&mut self) -> &mut ParticleStore {
        &mut self.store
    }

    pub fn boundary(&self) -> &BoundaryVolume {
        &self.boundary
    }

    /// Move or resize the box. The flow field and flow volume follow it.
    pub fn set_boundary(&mut self, center: Vec3, size: Vec3) {
        self.boundary.set_boundary(center, size);
        let padded = self.boundary.bounds().expanded(self.flow_padding);
        let (min, max) = (padded.min(), padded.max());
        self.flow = FlowField::new(min, max)
            .with_kind(self.flow.kind())
            .with_parameters(*self.flow.parameters())
            .with_global_strength(self.flow.global_strength());
        if let Some(flow_device) = self.flow_device.as_mut() {
            flow_device.set_bounds(min, max);
        }
    }

    pub fn flow(&self) -> &FlowField {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut FlowField {
        &mut self.flow
    }

    pub fn flow_device(&self) -> Option<&FlowFieldDevice> {
        self.flow_device.as_ref()
    }

    pub fn flow_device_mut(&mut self) -> Option<&mut FlowFieldDevice> {
        self.flow_device.as_mut()
    }

    pub fn physics(&self) -> &PhysicsParameters {
        &self.physics
    }

    pub fn set_physics(&mut self, physics: PhysicsParameters) {
        self.physics = physics;
    }

    pub fn emitter(&self) -> &ConeEmitter {
        &self.emitter
    }

    pub fn set_emitter(&mut self, emitter: ConeEmitter) {
        self.emitter = emitter;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> SmokeConfig {
        SmokeConfig::new()
            .with_capacity(256)
            .with_flow_resolution(4)
            .with_emitter(ConeEmitter::default().with_rate(16))
    }

    // ========== Config Tests ==========

    #[test]
    fn test_config_defaults() {
        let c = SmokeConfig::default();
        assert_eq!(c.capacity, 50_000);
        assert_eq!(c.boundary_center, Vec3::new(0.0, 50.0, 0.0));
        assert_eq!(c.boundary_size, Vec3::new(10.0, 20.0, 10.0));
        assert_eq!(c.flow_resolution, 64);
        assert_eq!(c.emitter.rate, 64);
        assert_eq!(c.device, DevicePreference::Gpu);
    }

    #[test]
    fn test_config_clamps() {
        let c = SmokeConfig::new()
            .with_capacity(0)
            .with_flow_resolution(1)
            .with_flow_padding(-1.0)
            .with_boundary(Vec3::ZERO, Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(c.capacity, 1);
        assert_eq!(c.flow_resolution, 2);
        assert_eq!(c.flow_padding, 0.0);
        assert!(c.boundary_size.min_element() > 0.0);
    }

    #[test]
    fn test_flow_bounds_padded() {
        let (min, max) = SmokeConfig::default().flow_bounds();
        assert!((min - Vec3::new(-5.2, 39.8, -5.2)).length() < 1e-4);
        assert!((max - Vec3::new(5.2, 60.2, 5.2)).length() < 1e-4);
    }

    // ========== Frame Tests ==========

    #[test]
    fn test_host_frame_spawns_and_sorts() {
        let mut smoke = SmokeSystem::host(&small_config());
        let mut rng = StdRng::seed_from_u64(1);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 50.0, 40.0), Vec3::new(0.0, 50.0, 0.0), Vec3::Y);

        let stats = smoke.frame(0.016, 0.016, &mut rng, &view);
        assert_eq!(stats.spawned, 16);
        assert_eq!(stats.committed, 16);
        assert_eq!(stats.alive, 16);
        assert!(!smoke.is_device());

        let depths: Vec<f32> = smoke.sprites().iter().map(|s| s.depth()).collect();
        assert_eq!(depths.len(), 16);
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_emulated_frame_regenerates_flow() {
        let mut smoke = SmokeSystem::emulated(&small_config());
        let mut rng = StdRng::seed_from_u64(2);
        assert!(smoke.is_device());

        let first = smoke.frame(0.016, 0.0, &mut rng, &Mat4::IDENTITY);
        assert!(first.flow_regenerated);
        assert_eq!(first.alive, 16);

        let second = smoke.frame(0.005, 0.005, &mut rng, &Mat4::IDENTITY);
        assert!(!second.flow_regenerated);
        assert_eq!(second.total, 32);
        assert_eq!(smoke.particles().len(), 32);
    }

    #[test]
    fn test_frame_respects_capacity() {
        let config = small_config()
            .with_capacity(40)
            .with_emitter(ConeEmitter::default().with_rate(16).with_lifespan(100.0));
        let mut smoke = SmokeSystem::emulated(&config);
        let mut rng = StdRng::seed_from_u64(3);
        let mut spawned = 0;
        for i in 0..5 {
            spawned += smoke.frame(0.01, i as f32 * 0.01, &mut rng, &Mat4::IDENTITY).spawned;
        }
        assert_eq!(spawned, 40);
        assert_eq!(smoke.total_count(), 40);
        assert!(smoke.alive_count() <= smoke.total_count());
    }

    #[test]
    fn test_missing_flow_volume_runs_without_flow() {
        let config = small_config();
        let mut smoke = SmokeSystem::with_devices(&config, Box::new(HostParticleDevice::new(64)), None);
        let mut rng = StdRng::seed_from_u64(4);
        let stats = smoke.frame(0.016, 0.0, &mut rng, &Mat4::IDENTITY);
        assert!(!stats.flow_regenerated);
        assert!(smoke.flow_device().is_some_and(|f| !f.is_ready()));
        assert_eq!(stats.alive, 16);
    }

    #[test]
    fn test_from_config_without_context_uses_host() {
        let smoke = SmokeSystem::from_config(&small_config(), None);
        assert!(!smoke.is_device());
    }

    #[test]
    fn test_set_boundary_moves_flow() {
        let mut smoke = SmokeSystem::emulated(&small_config());
        smoke.set_boundary(Vec3::ZERO, Vec3::splat(2.0));
        let (min, max) = smoke.flow().bounds();
        assert!((min - Vec3::splat(-1.2)).length() < 1e-5);
        assert!((max - Vec3::splat(1.2)).length() < 1e-5);
        let device_bounds = smoke.flow_device().map(|f| f.bounds());
        assert_eq!(device_bounds, Some((min, max)));
    }

    #[test]
    fn test_submit_streams_sprites() {
        let mut smoke = SmokeSystem::host(&small_config());
        let mut rng = StdRng::seed_from_u64(5);
        smoke.frame(0.016, 0.0, &mut rng, &Mat4::IDENTITY);
        let mut sink: Vec<SpriteVertex> = Vec::new();
        smoke.submit(&mut sink);
        assert_eq!(sink.as_slice(), smoke.sprites());
    }
}
