//! Device-resident flow volume.
//!
//! [`FlowFieldDevice`] owns a [`FlowVolume`] covering the simulation box and
//! refreshes it from [`WindParameters`] at most once per
//! [`FLOW_REFRESH_INTERVAL`]. The physics kernel samples it through
//! [`FlowFieldDevice::source`].
//!
//! The volume is optional: when its kernel failed to compile the device is
//! constructed with [`FlowFieldDevice::unavailable`], reports
//! `is_ready() == false`, and particles simply see no flow.

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

use crate::device::{FlowSource, FlowVolume};

/// Minimum time between two regenerations, in seconds.
pub const FLOW_REFRESH_INTERVAL: f32 = 0.016;

/// Default lattice resolution per axis.
pub const DEFAULT_FLOW_RESOLUTION: u32 = 64;

/// Wind model written into the volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindParameters {
    /// Normalized wind direction.
    pub direction: Vec3,
    pub strength: f32,
    pub time_scale: f32,
    /// Fraction of strength lost from bottom to top of the volume.
    pub height_variation: f32,
}

impl Default for WindParameters {
    fn default() -> Self {
        Self {
            direction: Vec3::Y,
            strength: 3.0,
            time_scale: 1.0,
            height_variation: 0.5,
        }
    }
}

impl WindParameters {
    /// Direction is normalized; a zero vector keeps the previous one.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        if let Some(dir) = direction.try_normalize() {
            self.direction = dir;
        }
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_height_variation(mut self, variation: f32) -> Self {
        self.height_variation = variation.clamp(0.0, 1.0);
        self
    }
}

/// Uniform block for the flow generation kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WindUniforms {
    pub direction: [f32; 3],
    pub strength: f32,
    pub world_min: [f32; 3],
    pub time: f32,
    pub world_max: [f32; 3],
    pub time_scale: f32,
    pub resolution: [u32; 3],
    pub height_variation: f32,
}

impl WindUniforms {
    pub const WGSL_STRUCT: &'static str = r#"struct WindUniforms {
    direction: vec3<f32>,
    strength: f32,
    world_min: vec3<f32>,
    time: f32,
    world_max: vec3<f32>,
    time_scale: f32,
    resolution: vec3<u32>,
    height_variation: f32,
};
"#;

    pub fn new(wind: &WindParameters, min: Vec3, max: Vec3, resolution: UVec3, time: f32) -> Self {
        Self {
            direction: wind.direction.to_array(),
            strength: wind.strength,
            world_min: min.to_array(),
            time,
            world_max: max.to_array(),
            time_scale: wind.time_scale,
            resolution: resolution.to_array(),
            height_variation: wind.height_variation,
        }
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (Vec3::from_array(self.world_min), Vec3::from_array(self.world_max))
    }

    /// Velocity the kernel writes at lattice node `node`.
    ///
    /// `direction * strength * (1 - height_variation * h) * (1 + 0.1 sin(t * time_scale))`
    /// with `h` the node's normalized height.
    pub fn velocity_at(&self, node: UVec3) -> Vec3 {
        let ny = self.resolution[1].max(2);
        let h = (node.y as f32 / (ny - 1) as f32).clamp(0.0, 1.0);
        let pulse = 1.0 + 0.1 * (self.time * self.time_scale).sin();
        Vec3::from_array(self.direction) * self.strength * (1.0 - self.height_variation * h) * pulse
    }
}

/// GPU-resident flow lattice with throttled regeneration.
pub struct FlowFieldDevice {
    volume: Option<Box<dyn FlowVolume>>,
    min: Vec3,
    max: Vec3,
    wind: WindParameters,
    enabled: bool,
    last_update: Option<f32>,
}

impl FlowFieldDevice {
    /// A device over `[min, max]` backed by `volume`. Enabled by default.
    pub fn new(volume: Box<dyn FlowVolume>, min: Vec3, max: Vec3) -> Self {
        Self {
            volume: Some(volume),
            min: min.min(max),
            max: min.max(max),
            wind: WindParameters::default(),
            enabled: true,
            last_update: None,
        }
    }

    /// A device whose volume could not be created. Never ready.
    pub fn unavailable(min: Vec3, max: Vec3) -> Self {
        Self {
            volume: None,
            min: min.min(max),
            max: min.max(max),
            wind: WindParameters::default(),
            enabled: false,
            last_update: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.volume.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.is_ready();
    }

    pub fn wind(&self) -> &WindParameters {
        &self.wind
    }

    /// New wind takes effect on the next regeneration.
    pub fn set_wind(&mut self, wind: WindParameters) {
        self.wind = wind;
        self.last_update = None;
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.min, self.max)
    }

    pub fn set_bounds(&mut self, min: Vec3, max: Vec3) {
        self.min = min.min(max);
        self.max = min.max(max);
        self.last_update = None;
    }

    pub fn resolution(&self) -> Option<UVec3> {
        self.volume.as_ref().map(|v| v.resolution())
    }

    pub fn last_update_time(&self) -> Option<f32> {
        self.last_update
    }

    /// Regenerate now, ignoring the throttle. No-op when not ready.
    pub fn regenerate(&mut self, time: f32) {
        let (min, max, wind) = (self.min, self.max, self.wind);
        let Some(volume) = self.volume.as_mut() else {
            return;
        };
        let uniforms = WindUniforms::new(&wind, min, max, volume.resolution(), time);
        volume.generate(&uniforms);
        volume.barrier();
        self.last_update = Some(time);
        log::debug!("flow volume regenerated at t={:.3}", time);
    }

    /// Regenerate if enabled and more than [`FLOW_REFRESH_INTERVAL`] has passed
    /// since the last regeneration. Returns whether it regenerated.
    pub fn update(&mut self, time: f32) -> bool {
        if !self.enabled || !self.is_ready() {
            return false;
        }
        let due = self
            .last_update
            .map_or(true, |last| (time - last).abs() > FLOW_REFRESH_INTERVAL);
        if due {
            self.regenerate(time);
        }
        due
    }

    /// Sampling handle, present once the volume is enabled and generated.
    pub fn source(&self) -> Option<FlowSource<'_>> {
        if !self.enabled || self.last_update.is_none() {
            return None;
        }
        self.volume.as_ref().map(|v| v.source())
    }
}
