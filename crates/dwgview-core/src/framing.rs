//! Model framing: fit an arbitrary scene into the camera's view
//!
//! Given the world extent of a freshly loaded model this computes the
//! re-centering offset, an optional normalising scale, the initial camera
//! pose with clip planes scaled to the model, the zoom limits for
//! interactive controls, and the home pose used by the reset animation.
//!
//! Degenerate (zero-size) and non-finite extents produce no framing at all;
//! the caller keeps whatever pose it already had.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bounds::Extent;
use crate::camera::{CameraPose, ControlBounds, HomePose};
use crate::scene::Scene;

/// Default vertical field of view in degrees
pub const DEFAULT_FOV_DEGREES: f32 = 75.0;

/// Tunables for [`compute_framing`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingOptions {
    /// Vertical field of view, fixed for the session
    pub fov_degrees: f32,
    /// Direction from the target to the camera. Zero falls back to (1,1,1).
    pub view_direction: Vec3,
    /// When set, the largest model axis is scaled to this size
    pub normalize_to: Option<f32>,
    /// near = distance / near_divisor
    pub near_divisor: f32,
    /// far = distance * far_multiplier
    pub far_multiplier: f32,
    /// Closest zoom as a fraction of the bounding radius
    pub min_distance_ratio: f32,
    /// Farthest zoom as a multiple of the framed distance
    pub max_distance_multiplier: f32,
}

impl Default for FramingOptions {
    fn default() -> Self {
        Self {
            fov_degrees: DEFAULT_FOV_DEGREES,
            view_direction: Vec3::ONE,
            normalize_to: None,
            near_divisor: 100.0,
            far_multiplier: 10.0,
            min_distance_ratio: 0.5,
            max_distance_multiplier: 3.0,
        }
    }
}

/// Result of one framing pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Framing {
    /// Translation applied to the model root (negated original center)
    pub centering: Vec3,
    /// Uniform scale applied after centering; 1.0 unless normalising
    pub scale: f32,
    /// Model extent before framing
    pub original: Extent,
    /// Model extent after centering and scaling
    pub extent: Extent,
    /// Bounding sphere radius of `extent`
    pub radius: f32,
    /// Camera distance from the origin
    pub distance: f32,
    pub camera: CameraPose,
    pub bounds: ControlBounds,
    pub home: HomePose,
}

/// True when an extent cannot be framed
pub fn is_degenerate(extent: &Extent) -> bool {
    extent.is_empty() || extent.size().length() == 0.0
}

/// Compute the framing for a model with the given world extent.
///
/// Returns `None` for degenerate or non-finite extents.
pub fn compute_framing(extent: &Extent, options: &FramingOptions) -> Option<Framing> {
    if is_degenerate(extent) {
        debug!("Zero-size model extent, keeping current camera");
        return None;
    }
    // Finite corners can still overflow once subtracted or summed
    if !extent.is_finite() || !extent.size().is_finite() || !extent.center().is_finite() {
        warn!(min = ?extent.min, max = ?extent.max, "Non-finite model extent, keeping current camera");
        return None;
    }

    let center = extent.center();
    let centering = -center;
    let centered = extent.translated(centering);

    let scale = match options.normalize_to {
        Some(target) if target > 0.0 => target / centered.size().max_element(),
        _ => 1.0,
    };
    let framed = centered.scaled(scale);

    let radius = framed.radius();
    let half_fov = options.fov_degrees.to_radians() * 0.5;
    let fitted = radius / half_fov.sin();
    let distance = fitted.max(radius * 2.0);

    let direction = options.view_direction.try_normalize().unwrap_or(Vec3::ONE.normalize());
    let position = direction * distance;

    let camera = CameraPose {
        position,
        target: Vec3::ZERO,
        fov_degrees: options.fov_degrees,
        near: distance / options.near_divisor,
        far: distance * options.far_multiplier,
    };
    let bounds = ControlBounds {
        min_distance: radius * options.min_distance_ratio,
        max_distance: distance * options.max_distance_multiplier,
    };
    let finite = [scale, radius, distance, camera.near, camera.far, bounds.max_distance]
        .iter()
        .all(|v| v.is_finite())
        && camera.position.is_finite();
    if !finite {
        warn!(radius, distance, "Model extent too large to frame, keeping current camera");
        return None;
    }

    debug!(
        center = ?center,
        size = ?framed.size(),
        radius,
        distance,
        "Computed model framing"
    );

    Some(Framing {
        centering,
        scale,
        original: *extent,
        extent: framed,
        radius,
        distance,
        camera,
        bounds,
        home: camera.home(),
    })
}

/// Frame a scene, re-centering (and optionally scaling) its root in place.
///
/// The root is left untouched when the scene's extent is degenerate.
pub fn frame_scene(scene: &mut Scene, options: &FramingOptions) -> Option<Framing> {
    let framing = compute_framing(&scene.world_extent(), options)?;
    scene.root.transform = scene
        .root
        .transform
        .recentered(framing.centering, framing.scale);
    Some(framing)
}
