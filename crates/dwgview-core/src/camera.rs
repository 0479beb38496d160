//! Camera pose, home pose, zoom limits and viewport

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::framing::DEFAULT_FOV_DEGREES;

/// Live perspective camera state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraPose {
    /// Pose used before any model has been framed
    fn default() -> Self {
        Self {
            position: Vec3::splat(100.0),
            target: Vec3::ZERO,
            fov_degrees: DEFAULT_FOV_DEGREES,
            near: 0.1,
            far: 10_000.0,
        }
    }
}

impl CameraPose {
    /// Distance between the camera and its orbit target
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Unit vector from the camera towards its target
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    pub fn home(&self) -> HomePose {
        HomePose {
            position: self.position,
            target: self.target,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.target.is_finite()
    }
}

/// Frozen pose captured right after framing; the reset target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomePose {
    pub position: Vec3,
    pub target: Vec3,
}

/// Allowed orbit distance range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlBounds {
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlBounds {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

impl ControlBounds {
    pub fn clamp(&self, distance: f32) -> f32 {
        distance.clamp(self.min_distance, self.max_distance)
    }

    pub fn contains(&self, distance: f32) -> bool {
        distance >= self.min_distance && distance <= self.max_distance
    }
}

/// Drawable surface size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a collapsed surface
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
