//! CPU emulation of the particle and flow devices.
//!
//! Same wire records, same counters, same arithmetic as the WGSL kernels in
//! [`crate::shaders`]. Work runs eagerly inside `dispatch_physics` and
//! `generate`, so the barriers have nothing to wait for.

use bytemuck::Zeroable;
use glam::{UVec3, Vec3};

use super::{FlowSource, FlowVolume, ParticleCounters, ParticleDevice};
use crate::error::GpuError;
use crate::flow_device::WindUniforms;
use crate::grid::GridFlowField;
use crate::particle::{ParticleGpu, ParticleState};
use crate::physics::{integrate, StepUniforms};

/// One pass of the physics kernel over `records[..uniforms.total]`.
///
/// Returns the counters the kernel would leave behind.
pub fn physics_kernel(
    records: &mut [ParticleGpu],
    uniforms: &StepUniforms,
    flow: Option<&GridFlowField>,
) -> ParticleCounters {
    let params = uniforms.parameters();
    let dt = uniforms.delta_time;
    let flow_min = Vec3::from_array(uniforms.flow_min);
    let flow_max = Vec3::from_array(uniforms.flow_max);
    let flow = flow.filter(|_| uniforms.has_flow != 0);

    let total = (uniforms.total as usize).min(records.len());
    let mut counters = ParticleCounters::new(0, 0, uniforms.total);

    for record in &mut records[..total] {
        if !record.is_alive() {
            counters.dead += 1;
            continue;
        }

        let position = Vec3::from_array(record.position);
        let velocity = Vec3::from_array(record.velocity);
        let inside = position.cmpge(flow_min).all() && position.cmple(flow_max).all();
        let flow_velocity = match flow {
            Some(grid) if inside => grid.trilinear_interpolate(position),
            _ => Vec3::ZERO,
        };

        let (position, velocity) = integrate(position, velocity, flow_velocity, &params, dt);
        record.position = position.to_array();
        record.velocity = velocity.to_array();
        record.age += dt;

        if record.age > record.lifespan {
            record.state = ParticleState::Dead as u32;
            counters.dead += 1;
        } else {
            counters.alive += 1;
        }
    }

    counters
}

/// Particle device backed by a `Vec`.
#[derive(Debug, Clone)]
pub struct HostParticleDevice {
    records: Vec<ParticleGpu>,
    counters: ParticleCounters,
}

impl HostParticleDevice {
    pub fn new(capacity: u32) -> Self {
        Self {
            records: vec![ParticleGpu::zeroed(); capacity as usize],
            counters: ParticleCounters::default(),
        }
    }

    /// Every slot, including those past `total`.
    pub fn records(&self) -> &[ParticleGpu] {
        &self.records
    }
}

impl ParticleDevice for HostParticleDevice {
    fn capacity(&self) -> u32 {
        self.records.len() as u32
    }

    fn write_particles(&mut self, offset: u32, records: &[ParticleGpu]) {
        let start = (offset as usize).min(self.records.len());
        let n = records.len().min(self.records.len() - start);
        if n < records.len() {
            log::warn!(
                "dropping {} particle records past capacity {}",
                records.len() - n,
                self.records.len()
            );
        }
        self.records[start..start + n].copy_from_slice(&records[..n]);
    }

    fn read_particles(&mut self, count: u32) -> Result<Vec<ParticleGpu>, GpuError> {
        let n = (count as usize).min(self.records.len());
        Ok(self.records[..n].to_vec())
    }

    fn write_counters(&mut self, counters: ParticleCounters) {
        self.counters = counters;
    }

    fn read_counters(&mut self) -> Result<ParticleCounters, GpuError> {
        Ok(self.counters)
    }

    fn dispatch_physics(&mut self, uniforms: &StepUniforms, flow: Option<FlowSource<'_>>) {
        let (uniforms, grid) = match flow {
            Some(FlowSource::Lattice(grid)) => {
                let (min, max) = (grid.world_min(), grid.world_max());
                (uniforms.with_flow(min, max), Some(grid))
            }
            Some(FlowSource::Texture { .. }) => {
                log::warn!("host device cannot sample a GPU flow texture; running without flow");
                (StepUniforms { has_flow: 0, ..*uniforms }, None)
            }
            None => (StepUniforms { has_flow: 0, ..*uniforms }, None),
        };
        self.counters = physics_kernel(&mut self.records, &uniforms, grid);
    }

    fn barrier(&mut self) {}
}

/// Flow volume backed by a [`GridFlowField`].
#[derive(Debug, Clone)]
pub struct HostFlowVolume {
    grid: GridFlowField,
}

impl HostFlowVolume {
    pub fn new(resolution: UVec3) -> Self {
        Self {
            grid: GridFlowField::new(resolution, Vec3::ZERO, Vec3::ONE),
        }
    }

    pub fn grid(&self) -> &GridFlowField {
        &self.grid
    }
}

impl FlowVolume for HostFlowVolume {
    fn resolution(&self) -> UVec3 {
        self.grid.resolution()
    }

    fn generate(&mut self, wind: &WindUniforms) {
        let (min, max) = wind.bounds();
        if self.grid.world_min() != min || self.grid.world_max() != max {
            self.grid = GridFlowField::new(self.grid.resolution(), min, max);
        }
        self.grid.fill_with(|node, _| wind.velocity_at(node));
    }

    fn barrier(&mut self) {}

    fn source(&self) -> FlowSource<'_> {
        FlowSource::Lattice(&self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use crate::physics::PhysicsParameters;

    fn record(pos: Vec3, vel: Vec3, lifespan: f32) -> ParticleGpu {
        ParticleGpu::from(&Particle::new(pos, vel, lifespan))
    }

    // ========== Kernel Tests ==========

    #[test]
    fn test_kernel_counts_alive_and_dead() {
        let mut records = vec![
            record(Vec3::ZERO, Vec3::X, 1.0),
            record(Vec3::ZERO, Vec3::X, 0.05),
            ParticleGpu::zeroed(),
            record(Vec3::ZERO, Vec3::X, 1.0),
        ];
        let u = StepUniforms::new(&PhysicsParameters::inert(), 0.1, 0.0, 3);
        let c = physics_kernel(&mut records, &u, None);
        assert_eq!(c, ParticleCounters::new(1, 2, 3));
        assert!(!records[1].is_alive());
        // slot past total untouched
        assert_eq!(records[3].age, 0.0);
    }

    #[test]
    fn test_kernel_dead_slots_do_not_move() {
        let mut records = vec![record(Vec3::ONE, Vec3::X, 1.0)];
        records[0].state = ParticleState::Dead as u32;
        let u = StepUniforms::new(&PhysicsParameters::default(), 0.1, 0.0, 1);
        physics_kernel(&mut records, &u, None);
        assert_eq!(records[0].position, [1.0, 1.0, 1.0]);
        assert_eq!(records[0].age, 0.0);
    }

    #[test]
    fn test_kernel_samples_flow_inside_bounds_only() {
        let mut grid = GridFlowField::new(UVec3::splat(2), Vec3::ZERO, Vec3::ONE);
        grid.fill_with(|_, _| Vec3::Y);
        let params = PhysicsParameters::inert().with_flow_influence(1.0);
        let u = StepUniforms::new(&params, 1.0, 0.0, 2).with_flow(Vec3::ZERO, Vec3::ONE);
        let mut records = vec![
            record(Vec3::splat(0.5), Vec3::ZERO, 10.0),
            record(Vec3::splat(2.0), Vec3::ZERO, 10.0),
        ];
        physics_kernel(&mut records, &u, Some(&grid));
        assert_eq!(records[0].velocity, [0.0, 1.0, 0.0]);
        assert_eq!(records[1].velocity, [0.0, 0.0, 0.0]);
    }

    // ========== Device Tests ==========

    #[test]
    fn test_write_past_capacity_truncates() {
        let mut dev = HostParticleDevice::new(4);
        let batch = vec![record(Vec3::ZERO, Vec3::ZERO, 1.0); 3];
        dev.write_particles(2, &batch);
        assert_eq!(dev.records().iter().filter(|r| r.is_alive()).count(), 2);
        dev.write_particles(9, &batch);
        assert_eq!(dev.records().iter().filter(|r| r.is_alive()).count(), 2);
    }

    #[test]
    fn test_read_clamped_to_capacity() {
        let mut dev = HostParticleDevice::new(4);
        assert_eq!(dev.read_particles(10).map(|r| r.len()).unwrap_or(0), 4);
    }

    #[test]
    fn test_dispatch_updates_counters() {
        let mut dev = HostParticleDevice::new(8);
        dev.write_particles(0, &[record(Vec3::ZERO, Vec3::ZERO, 1.0); 5]);
        dev.write_counters(ParticleCounters::new(5, 0, 5));
        let u = StepUniforms::new(&PhysicsParameters::default(), 0.5, 0.0, 5);
        dev.dispatch_physics(&u, None);
        dev.barrier();
        assert_eq!(dev.read_counters().ok(), Some(ParticleCounters::new(5, 0, 5)));
        dev.dispatch_physics(&u, None);
        dev.dispatch_physics(&u, None);
        assert_eq!(dev.read_counters().ok(), Some(ParticleCounters::new(0, 5, 5)));
    }

    #[test]
    fn test_flow_volume_follows_bounds() {
        let mut vol = HostFlowVolume::new(UVec3::splat(3));
        let wind = crate::flow_device::WindParameters::default();
        let u = WindUniforms::new(&wind, Vec3::splat(-2.0), Vec3::splat(2.0), vol.resolution(), 0.0);
        vol.generate(&u);
        assert_eq!(vol.grid().world_min(), Vec3::splat(-2.0));
        assert_eq!(vol.source().bounds().1, Vec3::splat(2.0));
    }
}
