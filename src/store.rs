//! Fixed-capacity particle pool.
//!
//! A [`ParticleStore`] runs in one of two modes, chosen at construction:
//!
//! - **Host**: particles live in a `Vec`, are integrated on the CPU, bounce off
//!   the [`BoundaryVolume`] and are removed (swap-with-last) the step they die.
//!   Storage is always compact.
//! - **Device**: particles live in a [`ParticleDevice`] buffer. The physics
//!   kernel tags dead slots without moving anything; [`ParticleStore::compact`]
//!   reclaims them later.
//!
//! Callers use the same operations in both modes:
//!
//! ```ignore
//! for p in emitter.emit(&boundary, &mut rng) {
//!     store.spawn(p);          // queued, dropped when full
//! }
//! store.commit();              // queued -> storage
//! store.advance(dt, time, &env);
//! store.maybe_compact(dt);
//! let snapshot = store.sync_for_render();
//! ```
//!
//! The store maintains `0 <= alive_count <= total_count <= capacity` at every
//! step, and never errors: spawns past capacity are dropped and failed
//! device reads keep the previous state.

use bytemuck::Zeroable;
use glam::Vec3;

use crate::boundary::BoundaryVolume;
use crate::device::{ParticleCounters, ParticleDevice};
use crate::flow::FlowField;
use crate::flow_device::FlowFieldDevice;
use crate::particle::{Particle, ParticleGpu};
use crate::physics::{integrate, PhysicsParameters, StepUniforms};

/// When [`ParticleStore::maybe_compact`] runs a compaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionPolicy {
    /// Seconds that must pass between compactions.
    pub interval: f32,
    /// Dead slots must exceed this fraction of capacity.
    pub dead_fraction: f32,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            interval: 2.0,
            dead_fraction: 0.25,
        }
    }
}

impl CompactionPolicy {
    pub fn with_interval(mut self, seconds: f32) -> Self {
        self.interval = seconds.max(0.0);
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_dead_fraction(mut self, fraction: f32) -> Self {
        self.dead_fraction = fraction.clamp(0.0, 1.0);
        self
    }
}

/// Inputs of one simulation step.
///
/// Host mode samples `flow` and collides with `boundary`. Device mode samples
/// `flow_device` and ignores the other two.
#[derive(Clone, Copy)]
pub struct StepEnvironment<'a> {
    pub physics: &'a PhysicsParameters,
    pub flow: Option<&'a FlowField>,
    pub flow_device: Option<&'a FlowFieldDevice>,
    pub boundary: Option<&'a BoundaryVolume>,
}

impl<'a> StepEnvironment<'a> {
    pub fn new(physics: &'a PhysicsParameters) -> Self {
        Self {
            physics,
            flow: None,
            flow_device: None,
            boundary: None,
        }
    }

    pub fn with_flow(mut self, flow: &'a FlowField) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn with_flow_device(mut self, flow_device: &'a FlowFieldDevice) -> Self {
        self.flow_device = Some(flow_device);
        self
    }

    pub fn with_boundary(mut self, boundary: &'a BoundaryVolume) -> Self {
        self.boundary = Some(boundary);
        self
    }
}

struct DeviceBacking {
    device: Box<dyn ParticleDevice>,
    dead: u32,
    /// Alive particles as of the last read-back.
    snapshot: Vec<Particle>,
}

enum Backing {
    Host(Vec<Particle>),
    Device(DeviceBacking),
}

/// Fixed-capacity particle pool with a spawn queue.
pub struct ParticleStore {
    capacity: u32,
    total: u32,
    alive: u32,
    staging: Vec<Particle>,
    backing: Backing,
    policy: CompactionPolicy,
    since_compaction: f32,
}

impl ParticleStore {
    /// A host-simulated pool.
    pub fn host(capacity: u32) -> Self {
        Self::with_backing(capacity, Backing::Host(Vec::with_capacity(capacity as usize)))
    }

    /// A device-simulated pool. Capacity is the device's slot count.
    pub fn device(mut device: Box<dyn ParticleDevice>) -> Self {
        let capacity = device.capacity();
        device.write_counters(ParticleCounters::default());
        Self::with_backing(
            capacity,
            Backing::Device(DeviceBacking {
                device,
                dead: 0,
                snapshot: Vec::new(),
            }),
        )
    }

    fn with_backing(capacity: u32, backing: Backing) -> Self {
        Self {
            capacity,
            total: 0,
            alive: 0,
            staging: Vec::new(),
            backing,
            policy: CompactionPolicy::default(),
            since_compaction: 0.0,
        }
    }

    pub fn with_compaction(mut self, policy: CompactionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Occupied slots: highest used index + 1.
    pub fn total_count(&self) -> u32 {
        self.total
    }

    pub fn alive_count(&self) -> u32 {
        self.alive
    }

    /// Dead slots awaiting compaction. Always 0 in host mode.
    pub fn dead_count(&self) -> u32 {
        match &self.backing {
            Backing::Host(_) => 0,
            Backing::Device(d) => d.dead,
        }
    }

    /// Particles spawned but not yet committed.
    pub fn queued(&self) -> usize {
        self.staging.len()
    }

    pub fn is_device(&self) -> bool {
        matches!(self.backing, Backing::Device(_))
    }

    pub fn compaction_policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    /// Queue a particle. Returns `false` (and drops it) when the pool plus
    /// queue is full.
    pub fn spawn(&mut self, particle: Particle) -> bool {
        if self.total as usize + self.staging.len() >= self.capacity as usize {
            return false;
        }
        self.staging.push(particle);
        true
    }

    /// Move queued particles into storage. Returns how many were stored.
    ///
    /// Records that are already expired never count as alive. Host storage
    /// skips them; device storage writes them as dead slots.
    pub fn commit(&mut self) -> u32 {
        if self.staging.is_empty() {
            return 0;
        }
        let room = (self.capacity - self.total) as usize;
        let n = self.staging.len().min(room);

        let (stored, live) = match &mut self.backing {
            Backing::Host(particles) => {
                let before = particles.len();
                particles.extend(self.staging.drain(..n).filter(Particle::is_alive));
                let live = (particles.len() - before) as u32;
                (live, live)
            }
            Backing::Device(d) => {
                let records: Vec<ParticleGpu> = self.staging[..n].iter().map(ParticleGpu::from).collect();
                let live = records.iter().filter(|r| r.is_alive()).count() as u32;
                d.dead += n as u32 - live;
                d.device.write_particles(self.total, &records);
                d.device.write_counters(ParticleCounters::new(
                    self.alive + live,
                    d.dead,
                    self.total + n as u32,
                ));
                log::debug!("uploaded {} particles at offset {}", n, self.total);
                (n as u32, live)
            }
        };
        self.staging.clear();

        self.total += stored;
        self.alive += live;
        stored
    }

    /// Advance every particle by `dt`.
    pub fn advance(&mut self, dt: f32, time: f32, env: &StepEnvironment<'_>) {
        match &mut self.backing {
            Backing::Host(particles) => {
                advance_host(particles, dt, time, env);
                self.total = particles.len() as u32;
                self.alive = self.total;
            }
            Backing::Device(d) => {
                if self.total == 0 {
                    return;
                }
                let uniforms = StepUniforms::new(env.physics, dt, time, self.total);
                let flow = env.flow_device.and_then(|f| f.source());
                d.device.dispatch_physics(&uniforms, flow);
                d.device.barrier();
                match d.device.read_counters() {
                    Ok(counters) => {
                        self.alive = counters.alive.min(self.total);
                        d.dead = counters.dead;
                    }
                    Err(e) => log::error!("counter read-back failed: {}", e),
                }
            }
        }
    }

    /// Move alive records to a contiguous prefix and release the rest.
    ///
    /// No-op in host mode and for an empty pool.
    pub fn compact(&mut self) {
        self.since_compaction = 0.0;
        let Backing::Device(d) = &mut self.backing else {
            return;
        };
        if self.total == 0 {
            return;
        }

        let records = match d.device.read_particles(self.total) {
            Ok(records) => records,
            Err(e) => {
                log::error!("compaction read-back failed: {}", e);
                return;
            }
        };
        let mut kept: Vec<ParticleGpu> = records.into_iter().filter(|r| r.is_alive()).collect();
        let alive = kept.len() as u32;
        kept.resize(self.total as usize, ParticleGpu::zeroed());

        d.device.write_particles(0, &kept);
        d.device.write_counters(ParticleCounters::new(alive, 0, alive));
        d.dead = 0;

        log::info!("compacted particles: {} of {} slots alive", alive, self.total);
        self.total = alive;
        self.alive = alive;
    }

    /// Compact when the policy interval has elapsed and enough slots are dead.
    /// Returns whether a compaction ran.
    pub fn maybe_compact(&mut self, dt: f32) -> bool {
        self.since_compaction += dt;
        let threshold = self.policy.dead_fraction * self.capacity as f32;
        if self.since_compaction > self.policy.interval && self.dead_count() as f32 > threshold {
            self.compact();
            return true;
        }
        false
    }

    /// Refresh the host copy of all alive particles and return it.
    ///
    /// Device mode does a blocking read-back of every occupied slot.
    pub fn sync_for_render(&mut self) -> &[Particle] {
        let total = self.total;
        match &mut self.backing {
            Backing::Host(particles) => particles.as_slice(),
            Backing::Device(d) => {
                if total == 0 {
                    d.snapshot.clear();
                } else {
                    match d.device.read_particles(total) {
                        Ok(records) => {
                            d.snapshot.clear();
                            d.snapshot.extend(records.iter().filter(|r| r.is_alive()).map(ParticleGpu::to_particle));
                        }
                        Err(e) => log::error!("particle read-back failed: {}", e),
                    }
                }
                d.snapshot.as_slice()
            }
        }
    }

    /// The last synchronized particles (host mode: the live array).
    pub fn particles(&self) -> &[Particle] {
        match &self.backing {
            Backing::Host(particles) => particles.as_slice(),
            Backing::Device(d) => d.snapshot.as_slice(),
        }
    }
}

fn advance_host(particles: &mut Vec<Particle>, dt: f32, time: f32, env: &StepEnvironment<'_>) {
    for p in particles.iter_mut() {
        let flow = env.flow.map_or(Vec3::ZERO, |f| f.sample(p.position, time));
        let (position, velocity) = integrate(p.position, p.velocity, flow, env.physics, dt);
        p.position = position;
        p.velocity = velocity;
        if let Some(boundary) = env.boundary {
            boundary.resolve_collision(p);
        }
        p.age += dt;
    }

    let mut i = 0;
    while i < particles.len() {
        if particles[i].is_alive() {
            i += 1;
        } else {
            particles.swap_remove(i);
        }
    }
}
