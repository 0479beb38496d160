//! Orbit / pan / zoom navigation around the camera target

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraPose, ControlBounds};

/// Keeps the camera off the poles so the up vector stays valid
const POLAR_EPSILON: f32 = 1.0e-3;

/// Input accumulated since the last frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDelta {
    /// Pointer movement in pixels while orbiting
    pub orbit: Vec2,
    /// Pointer movement in pixels while panning
    pub pan: Vec2,
    /// Wheel steps; positive moves closer
    pub zoom: f32,
}

impl InputDelta {
    pub fn is_zero(&self) -> bool {
        self.orbit == Vec2::ZERO && self.pan == Vec2::ZERO && self.zoom == 0.0
    }
}

/// Orbit controller settings and queued input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitControls {
    /// Radians per pixel of orbit drag
    pub rotate_speed: f32,
    /// Fraction of the orbit distance moved per pixel of pan drag
    pub pan_speed: f32,
    /// Distance multiplier per wheel step towards the target
    pub zoom_scale: f32,
    pub bounds: ControlBounds,
    pending: InputDelta,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            rotate_speed: 0.005,
            pan_speed: 0.002,
            zoom_scale: 0.95,
            bounds: ControlBounds::default(),
            pending: InputDelta::default(),
        }
    }
}

impl OrbitControls {
    pub fn queue_orbit(&mut self, delta: Vec2) {
        self.pending.orbit += delta;
    }

    pub fn queue_pan(&mut self, delta: Vec2) {
        self.pending.pan += delta;
    }

    pub fn queue_zoom(&mut self, steps: f32) {
        self.pending.zoom += steps;
    }

    pub fn queue(&mut self, delta: InputDelta) {
        self.pending.orbit += delta.orbit;
        self.pending.pan += delta.pan;
        self.pending.zoom += delta.zoom;
    }

    pub fn has_pending_input(&self) -> bool {
        !self.pending.is_zero()
    }

    /// Drop queued input without applying it
    pub fn discard_pending(&mut self) {
        self.pending = InputDelta::default();
    }

    /// Apply and clear queued input. The orbit distance is clamped to
    /// `bounds` every call, even with nothing queued.
    ///
    /// Returns true if the pose changed.
    pub fn apply(&mut self, pose: &mut CameraPose) -> bool {
        let delta = std::mem::take(&mut self.pending);
        let before = *pose;

        let mut offset = pose.position - pose.target;
        let mut radius = offset.length();
        if radius == 0.0 || !radius.is_finite() {
            offset = Vec3::Z;
            radius = 1.0;
        }

        // Spherical coordinates about +Y
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta -= delta.orbit.x * self.rotate_speed;
        phi = (phi - delta.orbit.y * self.rotate_speed)
            .clamp(POLAR_EPSILON, std::f32::consts::PI - POLAR_EPSILON);

        if delta.zoom != 0.0 {
            radius *= self.zoom_scale.powf(delta.zoom);
        }
        radius = self.bounds.clamp(radius);

        if delta.pan != Vec2::ZERO {
            let forward = -offset.normalize();
            let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
            let up = right.cross(forward);
            let scale = radius * self.pan_speed;
            pose.target += (-right * delta.pan.x + up * delta.pan.y) * scale;
        }

        let sin_phi = phi.sin();
        let direction = Vec3::new(sin_phi * theta.sin(), phi.cos(), sin_phi * theta.cos());
        pose.position = pose.target + direction * radius;

        *pose != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed_pose() -> (CameraPose, OrbitControls) {
        let pose = CameraPose {
            position: Vec3::splat(10.0),
            target: Vec3::ZERO,
            ..Default::default()
        };
        let controls = OrbitControls {
            bounds: ControlBounds {
                min_distance: 2.0,
                max_distance: 50.0,
            },
            ..Default::default()
        };
        (pose, controls)
    }

    #[test]
    fn test_zoom_is_clamped_to_bounds() {
        let (mut pose, mut controls) = framed_pose();

        controls.queue_zoom(500.0);
        controls.apply(&mut pose);
        assert!((pose.distance() - 2.0).abs() < 1e-4);

        controls.queue_zoom(-500.0);
        controls.apply(&mut pose);
        assert!((pose.distance() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_bounds_pose_is_pulled_back_without_input() {
        let (mut pose, mut controls) = framed_pose();
        pose.position = Vec3::new(0.0, 0.0, 0.5);
        assert!(controls.apply(&mut pose));
        assert!((pose.distance() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_keeps_distance_and_target() {
        let (mut pose, mut controls) = framed_pose();
        let distance = pose.distance();
        controls.queue_orbit(Vec2::new(140.0, -35.0));
        controls.apply(&mut pose);
        assert!((pose.distance() - distance).abs() < 1e-3);
        assert_eq!(pose.target, Vec3::ZERO);
        assert!(!controls.has_pending_input());
    }

    #[test]
    fn test_orbit_stops_at_pole() {
        let (mut pose, mut controls) = framed_pose();
        controls.queue_orbit(Vec2::new(0.0, 100_000.0));
        controls.apply(&mut pose);
        assert!(pose.position.is_finite());
        let up = (pose.position - pose.target).normalize().y;
        assert!(up < 1.0);
    }

    #[test]
    fn test_pan_moves_target_and_camera_together() {
        let (mut pose, mut controls) = framed_pose();
        let offset = pose.position - pose.target;
        controls.queue_pan(Vec2::new(25.0, 10.0));
        controls.apply(&mut pose);
        assert_ne!(pose.target, Vec3::ZERO);
        assert!((pose.position - pose.target - offset).length() < 1e-3);
    }
}
