//! Animated return to the home pose
//!
//! A reset captures the live camera position and target, then eases both
//! towards the home pose over a fixed number of ticks with an ease-out
//! cubic curve. The target moves in a straight line; the camera swings
//! around it on the view sphere, its orbit distance held within the
//! control bounds, so it never passes through the model. The last tick
//! snaps exactly onto the home pose.
//!
//! Only one animation drives the camera at a time. Every `start` or
//! `cancel` bumps a generation counter, and a token from an older
//! generation no longer ticks anything.

use glam::{Quat, Vec3};
use tracing::debug;

use crate::camera::{CameraPose, ControlBounds, HomePose};

/// Progress added per tick (50 ticks per reset)
pub const DEFAULT_PROGRESS_STEP: f32 = 0.02;

const PROGRESS_TOLERANCE: f32 = 1.0e-6;

/// Shortest camera-to-target offset with a usable direction
const MIN_ORBIT_OFFSET: f32 = 1.0e-6;

/// Ease-out cubic: fast start, slow finish
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStatus {
    /// No animation in flight
    Idle,
    /// Camera moved, more ticks to come
    Running,
    /// Camera snapped onto the home pose on this tick
    Finished,
    /// The animation was superseded or cancelled
    Cancelled,
}

/// Camera offset from the target, split into direction and distance
#[derive(Debug, Clone, Copy)]
struct OrbitPath {
    start_direction: Vec3,
    /// Rotation taking the start direction onto the home direction
    arc: Quat,
    start_distance: f32,
    home_distance: f32,
}

impl OrbitPath {
    fn between(live: &CameraPose, home: &HomePose) -> Option<Self> {
        let start = live.position - live.target;
        let end = home.position - home.target;
        let (start_distance, home_distance) = (start.length(), end.length());
        if !(start_distance > MIN_ORBIT_OFFSET && home_distance > MIN_ORBIT_OFFSET)
            || !start_distance.is_finite()
            || !home_distance.is_finite()
        {
            return None;
        }
        let start_direction = start / start_distance;
        Some(Self {
            start_direction,
            // Antiparallel directions turn about an arbitrary perpendicular
            arc: Quat::from_rotation_arc(start_direction, end / home_distance),
            start_distance,
            home_distance,
        })
    }

    fn offset(&self, eased: f32, bounds: &ControlBounds) -> Vec3 {
        let direction = Quat::IDENTITY.slerp(self.arc, eased) * self.start_direction;
        let distance = self.start_distance + (self.home_distance - self.start_distance) * eased;
        direction * bounds.clamp(distance)
    }
}

#[derive(Debug, Clone, Copy)]
struct ResetAnimation {
    generation: u64,
    start_position: Vec3,
    start_target: Vec3,
    orbit: Option<OrbitPath>,
    bounds: ControlBounds,
    home: HomePose,
    ticks: u32,
}

#[derive(Debug, Clone)]
pub struct ResetController {
    step: f32,
    generation: u64,
    active: Option<ResetAnimation>,
}

impl Default for ResetController {
    fn default() -> Self {
        Self::with_step(DEFAULT_PROGRESS_STEP)
    }
}

impl ResetController {
    /// Controller advancing `step` progress per tick
    pub fn with_step(step: f32) -> Self {
        Self {
            step: if step > 0.0 { step } else { DEFAULT_PROGRESS_STEP },
            generation: 0,
            active: None,
        }
    }

    /// Begin a reset from the live pose. Supersedes any reset in flight.
    /// The orbit distance stays within `bounds` until the final snap.
    ///
    /// Returns the generation token of the new animation.
    pub fn start(&mut self, live: &CameraPose, home: HomePose, bounds: ControlBounds) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.active = Some(ResetAnimation {
            generation: self.generation,
            start_position: live.position,
            start_target: live.target,
            orbit: OrbitPath::between(live, &home),
            bounds,
            home,
            ticks: 0,
        });
        debug!(generation = self.generation, "Camera reset started");
        self.generation
    }

    /// Stop any reset in flight, leaving the camera where it is
    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
            debug!(generation = self.generation, "Camera reset cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while `token` belongs to the animation currently in flight
    pub fn is_current(&self, token: u64) -> bool {
        self.active.map(|a| a.generation == token).unwrap_or(false)
    }

    /// Advance the animation one tick, writing the blended pose
    pub fn tick(&mut self, pose: &mut CameraPose) -> ResetStatus {
        let Some(mut anim) = self.active else {
            return ResetStatus::Idle;
        };

        anim.ticks += 1;
        // Multiply rather than accumulate so the tick count stays exact
        let progress = anim.ticks as f32 * self.step;
        if progress >= 1.0 - PROGRESS_TOLERANCE {
            pose.position = anim.home.position;
            pose.target = anim.home.target;
            self.active = None;
            debug!(generation = anim.generation, "Camera reset finished");
            return ResetStatus::Finished;
        }

        let eased = ease_out_cubic(progress);
        pose.target = anim.start_target.lerp(anim.home.target, eased);
        pose.position = match &anim.orbit {
            Some(orbit) => pose.target + orbit.offset(eased, &anim.bounds),
            None => anim.start_position.lerp(anim.home.position, eased),
        };
        self.active = Some(anim);
        ResetStatus::Running
    }

    /// Tick only if `token` is still the current animation
    pub fn tick_for(&mut self, token: u64, pose: &mut CameraPose) -> ResetStatus {
        if !self.is_current(token) {
            return ResetStatus::Cancelled;
        }
        self.tick(pose)
    }
}
