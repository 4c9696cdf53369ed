//! Orbit camera around the smoke column.

use glam::{Mat4, Vec3};

const MIN_DISTANCE: f32 = 1.0;
const MAX_DISTANCE: f32 = 500.0;
const PITCH_LIMIT: f32 = 1.5;

/// Orbit camera: yaw/pitch around a target at a given distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    pub distance: f32,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Looks at `target` from `distance`, slightly above.
    pub fn looking_at(target: Vec3, distance: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.3,
            distance: distance.clamp(MIN_DISTANCE, MAX_DISTANCE),
            target,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), self.near, self.far)
    }

    /// Rotate by `(dyaw, dpitch)` radians. Pitch stays short of the poles.
    pub fn orbit(&mut self, dyaw: f32, dpitch: f32) {
        self.yaw += dyaw;
        self.pitch = (self.pitch + dpitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Scale the distance by `factor`.
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 50.0, 0.0), 40.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at_distance() {
        let cam = Camera::looking_at(Vec3::new(1.0, 2.0, 3.0), 10.0);
        assert!(((cam.position() - cam.target).length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_target_in_front_of_view() {
        let cam = Camera::default();
        let v = cam.view_matrix().transform_point3(cam.target);
        assert!(v.z < 0.0);
        assert!(v.x.abs() < 1e-4 && v.y.abs() < 1e-4);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 10.0);
        assert_eq!(cam.pitch, PITCH_LIMIT);
        cam.orbit(0.0, -10.0);
        assert_eq!(cam.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut cam = Camera::default();
        cam.zoom(1e-6);
        assert_eq!(cam.distance, MIN_DISTANCE);
        cam.zoom(1e9);
        assert_eq!(cam.distance, MAX_DISTANCE);
    }
}
