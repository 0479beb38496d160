//! Orbit navigation and camera reset
//!
//! Pointer, wheel and touch input is queued on the core [`Viewer`], which
//! applies it (or advances a running reset) once per frame. The resulting
//! pose is then written onto the Bevy camera.

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::input::touch::Touches;
use bevy::prelude::*;
use tracing::debug;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use dwgview_core::{CameraPose, FramingOptions, Renderer, Scene, TickOutcome, Viewer, Viewport};

use crate::scene::CameraLight;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Camera, navigation and framing state for the loaded model
#[derive(Resource, Deref, DerefMut)]
pub struct ViewerState(pub Viewer);

impl Default for ViewerState {
    fn default() -> Self {
        Self(Viewer::new(FramingOptions::default(), Viewport::new(1280, 720)))
    }
}

/// Request an animated return to the home pose
#[derive(Message, Debug, Clone, Copy)]
pub struct ResetView;

/// Pixels of pinch spread per zoom step
const PINCH_PIXELS_PER_STEP: f32 = 40.0;
/// Pixel-unit wheel delta per zoom step (touchpads, some browsers)
const PIXELS_PER_SCROLL_STEP: f32 = 100.0;

#[derive(Resource, Default)]
struct PinchState {
    last_spread: Option<f32>,
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewerState>()
            .init_resource::<PinchState>()
            .add_message::<ResetView>()
            .add_systems(
                Update,
                (
                    track_viewport,
                    pointer_input,
                    touch_input,
                    reset_shortcut,
                    apply_reset_requests,
                    drive_camera,
                )
                    .chain(),
            );
    }
}

pub fn camera_transform(pose: &CameraPose) -> Transform {
    Transform::from_translation(pose.position).looking_at(pose.target, Vec3::Y)
}

pub fn perspective(pose: &CameraPose, aspect_ratio: f32) -> PerspectiveProjection {
    PerspectiveProjection {
        fov: pose.fov_degrees.to_radians(),
        aspect_ratio,
        near: pose.near,
        far: pose.far,
        ..default()
    }
}

/// Writes the viewer's pose onto the Bevy camera; Bevy does the drawing
struct BevyCamera<'a> {
    transform: &'a mut Transform,
    projection: &'a mut Projection,
}

impl Renderer for BevyCamera<'_> {
    fn render(&mut self, _scene: &Scene, camera: &CameraPose, viewport: Viewport) {
        *self.transform = camera_transform(camera);
        if let Projection::Perspective(p) = &mut *self.projection {
            *p = perspective(camera, viewport.aspect_ratio());
        }
    }
}

fn pointer_over_ui(contexts: &mut EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area() || ctx.wants_pointer_input())
        .unwrap_or(false)
}

fn track_viewport(windows: Query<&Window, With<PrimaryWindow>>, mut viewer: ResMut<ViewerState>) {
    let Ok(window) = windows.single() else {
        return;
    };
    let size = Viewport::new(window.physical_width(), window.physical_height());
    if size != viewer.viewport() {
        viewer.resize(size);
    }
}

fn pointer_input(
    mut contexts: EguiContexts,
    buttons: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    mut viewer: ResMut<ViewerState>,
) {
    if pointer_over_ui(&mut contexts) {
        return;
    }
    let controls = viewer.controls_mut();

    if motion.delta != Vec2::ZERO {
        if buttons.pressed(MouseButton::Left) {
            controls.queue_orbit(motion.delta);
        } else if buttons.pressed(MouseButton::Right) || buttons.pressed(MouseButton::Middle) {
            controls.queue_pan(motion.delta);
        }
    }

    let steps = match scroll.unit {
        MouseScrollUnit::Line => scroll.delta.y,
        MouseScrollUnit::Pixel => scroll.delta.y / PIXELS_PER_SCROLL_STEP,
    };
    if steps != 0.0 {
        controls.queue_zoom(steps);
    }
}

/// One finger orbits, two fingers pinch-zoom
fn touch_input(touches: Res<Touches>, mut pinch: ResMut<PinchState>, mut viewer: ResMut<ViewerState>) {
    let active: Vec<_> = touches.iter().collect();
    match active.as_slice() {
        [finger] => {
            pinch.last_spread = None;
            let delta = finger.delta();
            if delta != Vec2::ZERO {
                viewer.controls_mut().queue_orbit(delta);
            }
        }
        [a, b, ..] => {
            let spread = a.position().distance(b.position());
            if let Some(last) = pinch.last_spread {
                let steps = (spread - last) / PINCH_PIXELS_PER_STEP;
                if steps != 0.0 {
                    viewer.controls_mut().queue_zoom(steps);
                }
            }
            pinch.last_spread = Some(spread);
        }
        [] => pinch.last_spread = None,
    }
}

fn reset_shortcut(
    mut contexts: EguiContexts,
    keys: Res<ButtonInput<KeyCode>>,
    mut reset: MessageWriter<ResetView>,
) {
    if !keys.just_pressed(KeyCode::KeyR) {
        return;
    }
    let typing = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_keyboard_input())
        .unwrap_or(false);
    if !typing {
        reset.write(ResetView);
    }
}

fn apply_reset_requests(mut requests: MessageReader<ResetView>, mut viewer: ResMut<ViewerState>) {
    // Several requests in one frame collapse into one; the newest reset
    // supersedes any still running
    if requests.read().count() > 0 && !viewer.reset_view() {
        debug!("Reset ignored: no model framed yet");
    }
}

fn drive_camera(
    mut viewer: ResMut<ViewerState>,
    mut camera: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
    mut light: Query<&mut Transform, (With<CameraLight>, Without<MainCamera>)>,
) {
    let Ok((mut transform, mut projection)) = camera.single_mut() else {
        return;
    };
    let outcome = viewer.tick(&mut BevyCamera {
        transform: &mut *transform,
        projection: &mut *projection,
    });
    if outcome == TickOutcome::Skipped {
        return;
    }
    if let Ok(mut light) = light.single_mut() {
        light.rotation = transform.rotation;
    }
}
