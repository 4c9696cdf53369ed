//! Analytic flow fields.
//!
//! A [`FlowField`] maps `(position, time)` to an ambient velocity that the
//! physics step adds as a forcing term. Five kinds are available:
//!
//! | Kind | Shape |
//! |------|-------|
//! | [`FlowFieldKind::UniformWind`] | constant direction, slow pulsing |
//! | [`FlowFieldKind::Vortex`] | swirl around an axis, decays with distance |
//! | [`FlowFieldKind::UpwardFlow`] | updraft weakening with height, noisy sideways drift |
//! | [`FlowFieldKind::Turbulent`] | three octaves of value noise |
//! | [`FlowFieldKind::CustomGrid`] | trilinear lookup into a [`GridFlowField`] |
//!
//! Every kind returns exactly zero outside the field bounds, and every result
//! is scaled by the field's global strength.
//!
//! # Example
//!
//! ```ignore
//! let mut flow = FlowField::new(Vec3::new(-5.0, 40.0, -5.0), Vec3::new(5.0, 60.0, 5.0));
//! flow.set_kind(FlowFieldKind::Vortex);
//! let v = flow.sample(Vec3::new(2.0, 50.0, 0.0), 1.5);
//! ```

use glam::{UVec3, Vec3};

use crate::grid::GridFlowField;
use crate::noise::value_noise;

/// Below this distance from the vortex axis the swirl is zero.
const VORTEX_CORE_RADIUS: f32 = 0.01;

/// Which analytic model a [`FlowField`] evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowFieldKind {
    UniformWind,
    Vortex,
    #[default]
    UpwardFlow,
    Turbulent,
    CustomGrid,
}

impl FlowFieldKind {
    pub const ALL: [FlowFieldKind; 5] = [
        FlowFieldKind::UniformWind,
        FlowFieldKind::Vortex,
        FlowFieldKind::UpwardFlow,
        FlowFieldKind::Turbulent,
        FlowFieldKind::CustomGrid,
    ];
}

/// Shape parameters for the analytic kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowFieldParameters {
    pub wind_direction: Vec3,
    pub wind_strength: f32,
    pub vortex_center: Vec3,
    pub vortex_axis: Vec3,
    pub vortex_strength: f32,
    pub upward_strength: f32,
    pub turbulence_scale: f32,
    pub turbulence_strength: f32,
    /// Multiplier on time for all periodic terms.
    pub time_scale: f32,
}

impl Default for FlowFieldParameters {
    fn default() -> Self {
        Self {
            wind_direction: Vec3::X,
            wind_strength: 2.0,
            vortex_center: Vec3::new(0.0, 20.0, 0.0),
            vortex_axis: Vec3::Y,
            vortex_strength: 3.0,
            upward_strength: 2.5,
            turbulence_scale: 0.1,
            turbulence_strength: 1.0,
            time_scale: 1.0,
        }
    }
}

impl FlowFieldParameters {
    /// Wind direction, normalized. A zero vector keeps the previous direction.
    pub fn with_wind(mut self, direction: Vec3, strength: f32) -> Self {
        if let Some(dir) = direction.try_normalize() {
            self.wind_direction = dir;
        }
        self.wind_strength = strength;
        self
    }

    /// Vortex center, axis (normalized) and strength.
    pub fn with_vortex(mut self, center: Vec3, axis: Vec3, strength: f32) -> Self {
        self.vortex_center = center;
        if let Some(axis) = axis.try_normalize() {
            self.vortex_axis = axis;
        }
        self.vortex_strength = strength;
        self
    }

    pub fn with_upward_strength(mut self, strength: f32) -> Self {
        self.upward_strength = strength;
        self
    }

    /// Noise frequency (clamped to `> 0`) and amplitude.
    pub fn with_turbulence(mut self, scale: f32, strength: f32) -> Self {
        self.turbulence_scale = scale.max(1e-4);
        self.turbulence_strength = strength;
        self
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }
}

/// An analytic or lattice-backed velocity field over a box.
#[derive(Debug, Clone)]
pub struct FlowField {
    kind: FlowFieldKind,
    params: FlowFieldParameters,
    bounds_min: Vec3,
    bounds_max: Vec3,
    global_strength: f32,
    grid: Option<GridFlowField>,
}

impl FlowField {
    /// Upward flow over `[bounds_min, bounds_max]` with default parameters.
    pub fn new(bounds_min: Vec3, bounds_max: Vec3) -> Self {
        Self {
            kind: FlowFieldKind::default(),
            params: FlowFieldParameters::default(),
            bounds_min: bounds_min.min(bounds_max),
            bounds_max: bounds_min.max(bounds_max),
            global_strength: 1.0,
            grid: None,
        }
    }

    /// Build a lattice over the bounds and seed it from the upward flow.
    pub fn initialize(bounds_min: Vec3, bounds_max: Vec3, resolution: UVec3) -> Self {
        let mut field = Self::new(bounds_min, bounds_max);
        field.grid = Some(GridFlowField::new(resolution, field.bounds_min, field.bounds_max));
        field.generate_grid_from(FlowFieldKind::UpwardFlow, 0.0);
        field
    }

    pub fn with_kind(mut self, kind: FlowFieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_parameters(mut self, params: FlowFieldParameters) -> Self {
        self.params = params;
        self
    }

    /// Global multiplier, clamped to `>= 0`.
    pub fn with_global_strength(mut self, strength: f32) -> Self {
        self.global_strength = strength.max(0.0);
        self
    }

    pub fn kind(&self) -> FlowFieldKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: FlowFieldKind) {
        self.kind = kind;
    }

    pub fn parameters(&self) -> &FlowFieldParameters {
        &self.params
    }

    pub fn set_parameters(&mut self, params: FlowFieldParameters) {
        self.params = params;
    }

    pub fn global_strength(&self) -> f32 {
        self.global_strength
    }

    pub fn set_global_strength(&mut self, strength: f32) {
        self.global_strength = strength.max(0.0);
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    pub fn grid(&self) -> Option<&GridFlowField> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut GridFlowField> {
        self.grid.as_mut()
    }

    /// Replace the lattice used by [`FlowFieldKind::CustomGrid`].
    pub fn set_grid(&mut self, grid: GridFlowField) {
        self.grid = Some(grid);
    }

    pub fn is_in_bounds(&self, position: Vec3) -> bool {
        position.cmpge(self.bounds_min).all() && position.cmple(self.bounds_max).all()
    }

    /// Velocity at `position` and `time`; zero outside the bounds.
    pub fn sample(&self, position: Vec3, time: f32) -> Vec3 {
        if !self.is_in_bounds(position) {
            return Vec3::ZERO;
        }
        let velocity = match self.kind {
            FlowFieldKind::CustomGrid => self.grid_velocity(position),
            kind => self.analytic(kind, position, time),
        };
        velocity * self.global_strength
    }

    /// Refill the lattice from an analytic kind. `CustomGrid` writes zeros.
    /// No-op without a lattice.
    pub fn generate_grid_from(&mut self, kind: FlowFieldKind, time: f32) {
        let Some(mut grid) = self.grid.take() else {
            return;
        };
        grid.fill_with(|_, pos| match kind {
            FlowFieldKind::CustomGrid => Vec3::ZERO,
            kind => self.analytic(kind, pos, time),
        });
        self.grid = Some(grid);
    }

    /// Refresh the lattice from the upward flow at `time`.
    pub fn update_grid(&mut self, time: f32) {
        self.generate_grid_from(FlowFieldKind::UpwardFlow, time);
    }

    fn grid_velocity(&self, position: Vec3) -> Vec3 {
        self.grid
            .as_ref()
            .map_or(Vec3::ZERO, |g| g.trilinear_interpolate(position))
    }

    fn analytic(&self, kind: FlowFieldKind, position: Vec3, time: f32) -> Vec3 {
        match kind {
            FlowFieldKind::UniformWind => self.uniform_wind(time),
            FlowFieldKind::Vortex => self.vortex(position, time),
            FlowFieldKind::UpwardFlow => self.upward(position, time),
            FlowFieldKind::Turbulent => self.turbulent(position, time),
            FlowFieldKind::CustomGrid => Vec3::ZERO,
        }
    }

    fn uniform_wind(&self, time: f32) -> Vec3 {
        let p = &self.params;
        p.wind_direction * p.wind_strength * (1.0 + 0.1 * (time * p.time_scale).sin())
    }

    fn vortex(&self, position: Vec3, time: f32) -> Vec3 {
        let p = &self.params;
        let Some(axis) = p.vortex_axis.try_normalize() else {
            return Vec3::ZERO;
        };
        let to_particle = position - p.vortex_center;
        let radial = to_particle - to_particle.dot(axis) * axis;
        let distance = radial.length();
        if distance < VORTEX_CORE_RADIUS {
            return Vec3::ZERO;
        }

        let tangential = axis.cross(radial / distance);
        let strength = p.vortex_strength / (1.0 + distance * 0.1);
        let variation = 1.0 + 0.2 * (time * p.time_scale * 2.0).sin();
        tangential * strength * variation
    }

    fn upward(&self, position: Vec3, time: f32) -> Vec3 {
        let p = &self.params;
        let height = self.bounds_max.y - self.bounds_min.y;
        let h = if height > 0.0 {
            ((position.y - self.bounds_min.y) / height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let upward = Vec3::new(0.0, p.upward_strength, 0.0) * (1.0 - 0.5 * h);

        let q = position * 0.05;
        let x_noise = value_noise(q + Vec3::new(time * 0.5, 0.0, 0.0));
        let z_noise = value_noise(q + Vec3::new(0.0, time * 0.5, 0.0));
        let jitter = Vec3::new(x_noise, 0.0, z_noise) * 0.5;

        (upward + jitter) * (1.0 + 0.1 * (time * p.time_scale).sin())
    }

    fn turbulent(&self, position: Vec3, time: f32) -> Vec3 {
        let p = &self.params;
        let mut out = Vec3::ZERO;
        for octave in 0..3 {
            let octave_scale = (1u32 << octave) as f32;
            let freq = p.turbulence_scale * octave_scale;
            let amplitude = p.turbulence_strength / octave_scale;
            let s = position * freq + Vec3::splat(time * p.time_scale);

            out.x += value_noise(s) * amplitude;
            out.y += value_noise(s + Vec3::new(100.0, 0.0, 0.0)) * amplitude;
            out.z += value_noise(s + Vec3::new(0.0, 100.0, 0.0)) * amplitude;
        }
        out
    }
}
