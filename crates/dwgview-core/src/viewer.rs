//! Viewer context: owns the current scene, camera and navigation state
//!
//! All mutation happens on one logical thread. A [`Viewer`] is explicitly
//! constructed and passed around; there is no global instance. The
//! [`RenderLoop`] drives [`Viewer::tick`] once per frame until its
//! [`StopHandle`] is triggered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::camera::{CameraPose, ControlBounds, HomePose, Viewport};
use crate::controls::OrbitControls;
use crate::framing::{frame_scene, Framing, FramingOptions};
use crate::reset::{ResetController, ResetStatus};
use crate::scene::Scene;

/// Draws a scene from a camera. Implemented by the rendering backend.
pub trait Renderer {
    fn render(&mut self, scene: &Scene, camera: &CameraPose, viewport: Viewport);
}

/// What a call to [`Viewer::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No scene attached yet
    Skipped,
    Rendered,
}

pub struct Viewer {
    options: FramingOptions,
    scene: Option<Scene>,
    camera: CameraPose,
    viewport: Viewport,
    controls: OrbitControls,
    framing: Option<Framing>,
    home: Option<HomePose>,
    reset: ResetController,
}

impl Viewer {
    pub fn new(options: FramingOptions, viewport: Viewport) -> Self {
        let camera = CameraPose {
            fov_degrees: options.fov_degrees,
            ..Default::default()
        };
        Self {
            options,
            scene: None,
            camera,
            viewport,
            controls: OrbitControls::default(),
            framing: None,
            home: None,
            reset: ResetController::default(),
        }
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn camera(&self) -> &CameraPose {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn framing(&self) -> Option<&Framing> {
        self.framing.as_ref()
    }

    pub fn home(&self) -> Option<HomePose> {
        self.home
    }

    pub fn control_bounds(&self) -> ControlBounds {
        self.controls.bounds
    }

    /// Queue user navigation for the next tick
    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn is_resetting(&self) -> bool {
        self.reset.is_running()
    }

    /// Retire the current scene and attach `scene`, then frame it.
    ///
    /// The old scene is dropped before the new one is attached, in a single
    /// call, so no two scenes are ever active. A degenerate model keeps the
    /// current camera and leaves no home pose.
    pub fn replace_scene(&mut self, mut scene: Scene) -> Option<Framing> {
        self.reset.cancel();
        self.controls.discard_pending();

        let framing = frame_scene(&mut scene, &self.options);
        if let Some(old) = self.scene.take() {
            debug!(source = ?old.source, "Retired previous scene");
        }
        info!(
            source = ?scene.source,
            meshes = scene.mesh_count(),
            framed = framing.is_some(),
            "Attached scene"
        );
        self.scene = Some(scene);

        match framing {
            Some(f) => {
                self.camera = f.camera;
                self.controls.bounds = f.bounds;
                self.home = Some(f.home);
            }
            None => {
                self.controls.bounds = ControlBounds::default();
                self.home = None;
            }
        }
        self.framing = framing;
        framing
    }

    /// Load a scene and attach it only once it has fully loaded. A failed
    /// load leaves the current scene and camera untouched.
    #[cfg(feature = "fetch")]
    pub async fn load(
        &mut self,
        loader: &crate::loader::SceneLoader,
        source: &crate::loader::SceneSource,
        progress: Option<&tokio::sync::mpsc::UnboundedSender<crate::loader::LoadProgress>>,
    ) -> Result<Option<Framing>, crate::loader::LoadError> {
        let scene = loader.load(source, progress).await?;
        Ok(self.replace_scene(scene))
    }

    /// Start the eased return to the home pose.
    ///
    /// No-op (returns false) until a model has been framed.
    pub fn reset_view(&mut self) -> bool {
        let Some(home) = self.home else {
            debug!("Reset requested before any model was framed");
            return false;
        };
        self.reset.start(&self.camera, home, self.controls.bounds);
        true
    }

    /// Record a new drawable size. Only the projection aspect depends on
    /// it; the model is not re-framed.
    ///
    /// Returns false while no scene is attached.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        self.viewport = viewport;
        if self.scene.is_none() {
            return false;
        }
        debug!(
            width = viewport.width,
            height = viewport.height,
            aspect = viewport.aspect_ratio(),
            "Viewport resized"
        );
        true
    }

    /// One interaction-loop step: apply navigation, advance any reset
    /// animation, render.
    pub fn tick<R: Renderer>(&mut self, renderer: &mut R) -> TickOutcome {
        let Some(scene) = self.scene.as_ref() else {
            self.controls.discard_pending();
            return TickOutcome::Skipped;
        };

        if self.reset.is_running() && self.controls.has_pending_input() {
            // User input takes over from the animation
            self.reset.cancel();
        }

        if self.reset.is_running() {
            self.controls.discard_pending();
            if self.reset.tick(&mut self.camera) == ResetStatus::Finished {
                debug!("Camera back at home pose");
            }
        } else {
            self.controls.apply(&mut self.camera);
        }

        renderer.render(scene, &self.camera, self.viewport);
        TickOutcome::Rendered
    }
}

/// Cloneable flag that stops a [`RenderLoop`]
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed-rate frame driver with explicit shutdown
#[derive(Debug, Clone)]
pub struct RenderLoop {
    frame_interval: Duration,
    stop: StopHandle,
}

impl RenderLoop {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            stop: StopHandle::default(),
        }
    }

    /// ~60 frames per second
    pub fn display_rate() -> Self {
        Self::new(Duration::from_micros(16_667))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Tick until stopped. Returns the number of frames run.
    pub fn run<R: Renderer>(&self, viewer: &mut Viewer, renderer: &mut R) -> u64 {
        let mut frames = 0;
        while !self.stop.is_stopped() {
            let started = Instant::now();
            viewer.tick(renderer);
            frames += 1;
            if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        info!(frames, "Render loop stopped");
        frames
    }

    /// Tick exactly `frames` times without pacing, or fewer if stopped
    pub fn run_frames<R: Renderer>(&self, viewer: &mut Viewer, renderer: &mut R, frames: u64) -> u64 {
        let mut ran = 0;
        while ran < frames && !self.stop.is_stopped() {
            viewer.tick(renderer);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Node;
    use glam::{Vec2, Vec3};

    #[derive(Default)]
    struct CountingRenderer {
        frames: usize,
        last: Option<CameraPose>,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl Renderer for CountingRenderer {
        fn render(&mut self, _scene: &Scene, camera: &CameraPose, _viewport: Viewport) {
            self.frames += 1;
            self.last = Some(*camera);
            if let Some((limit, handle)) = &self.stop_after {
                if self.frames >= *limit {
                    handle.stop();
                }
            }
        }
    }

    fn cube(center: Vec3, size: f32) -> Scene {
        Scene::new(Node::named("model").with_child(Node::with_box("cube", center, Vec3::splat(size))))
    }

    fn viewer() -> Viewer {
        Viewer::new(FramingOptions::default(), Viewport::new(800, 600))
    }

    #[test]
    fn test_uninitialized_viewer_is_guarded() {
        let mut viewer = viewer();
        let mut renderer = CountingRenderer::default();
        let before = *viewer.camera();

        assert_eq!(viewer.tick(&mut renderer), TickOutcome::Skipped);
        assert!(!viewer.reset_view());
        assert!(!viewer.resize(Viewport::new(1024, 768)));
        assert_eq!(renderer.frames, 0);
        assert_eq!(*viewer.camera(), before);
    }

    #[test]
    fn test_orbit_zoom_then_reset_returns_home() {
        let mut viewer = viewer();
        let mut renderer = CountingRenderer::default();
        viewer.replace_scene(cube(Vec3::ZERO, 2.0)).expect("framed");
        let home = viewer.home().expect("home pose");

        viewer.controls_mut().queue_orbit(Vec2::new(230.0, -80.0));
        viewer.controls_mut().queue_zoom(6.0);
        viewer.tick(&mut renderer);
        viewer.controls_mut().queue_pan(Vec2::new(-40.0, 15.0));
        viewer.tick(&mut renderer);
        assert!(viewer.camera().position.distance(home.position) > 0.1);

        assert!(viewer.reset_view());
        let loop_ = RenderLoop::new(Duration::ZERO);
        loop_.run_frames(&mut viewer, &mut renderer, 60);

        assert!(!viewer.is_resetting());
        assert!(viewer.camera().position.distance(home.position) < 1e-3);
        assert!(viewer.camera().target.distance(home.target) < 1e-3);
        assert_eq!(viewer.home(), Some(home));
    }

    #[test]
    fn test_reset_from_far_side_keeps_zoom_limits() {
        let mut viewer = viewer();
        let mut renderer = CountingRenderer::default();
        viewer.replace_scene(cube(Vec3::ZERO, 2.0)).expect("framed");
        let bounds = viewer.control_bounds();

        // Half a turn round, down under the model, then zoomed all the way in
        let half_turn = std::f32::consts::PI / viewer.controls_mut().rotate_speed;
        viewer.controls_mut().queue_orbit(Vec2::new(half_turn, -300.0));
        viewer.controls_mut().queue_zoom(1000.0);
        viewer.tick(&mut renderer);
        let start = viewer.camera().position;
        assert!(start.y < 0.0 && start.x < 0.0 && start.z < 0.0);

        assert!(viewer.reset_view());
        while viewer.is_resetting() {
            viewer.tick(&mut renderer);
            let d = viewer.camera().distance();
            assert!(d >= bounds.min_distance - 1e-4, "distance {d} below {}", bounds.min_distance);
            assert!(d <= bounds.max_distance + 1e-4);
        }
        let home = viewer.home().expect("home pose");
        assert!(viewer.camera().position.distance(home.position) < 1e-3);
    }

    #[test]
    fn test_zoom_respects_bounds_every_tick() {
        let mut viewer = viewer();
        let mut renderer = CountingRenderer::default();
        let framing = viewer.replace_scene(cube(Vec3::splat(5.0), 10.0)).expect("framed");

        viewer.controls_mut().queue_zoom(1000.0);
        viewer.tick(&mut renderer);
        assert!((viewer.camera().distance() - framing.radius * 0.5).abs() < 1e-3);

        viewer.controls_mut().queue_zoom(-1000.0);
        viewer.tick(&mut renderer);
        assert!((viewer.camera().distance() - framing.distance * 3.0).abs() < 1e-2);
    }

    #[test]
    fn test_user_input_cancels_reset() {
        let mut viewer = viewer();
        let mut renderer = CountingRenderer::default();
        viewer.replace_scene(cube(Vec3::ZERO, 2.0));
        viewer.controls_mut().queue_orbit(Vec2::new(300.0, 0.0));
        viewer.tick(&mut renderer);

        viewer.reset_view();
        viewer.tick(&mut renderer);
        viewer.controls_mut().queue_orbit(Vec2::new(10.0, 0.0));
        viewer.tick(&mut renderer);
        assert!(!viewer.is_resetting());
    }

    #[test]
    fn test_replacing_scene_reframes() {
        let mut viewer = viewer();
        let first = viewer.replace_scene(cube(Vec3::ZERO, 2.0)).expect("framed");
        viewer.reset_view();

        let second = viewer.replace_scene(cube(Vec3::new(400.0, 0.0, 0.0), 50.0)).expect("framed");
        assert!(!viewer.is_resetting());
        assert!(second.distance > first.distance);
        assert_eq!(viewer.home(), Some(second.home));
        let scene = viewer.scene().expect("scene attached");
        assert!(scene.world_extent().center().length() < 1e-3);
    }

    #[test]
    fn test_degenerate_scene_keeps_camera() {
        let mut viewer = viewer();
        let before = *viewer.camera();
        assert!(viewer.replace_scene(cube(Vec3::splat(3.0), 0.0)).is_none());
        assert_eq!(*viewer.camera(), before);
        assert!(viewer.camera().is_finite());
        assert!(!viewer.reset_view());

        let mut renderer = CountingRenderer::default();
        assert_eq!(viewer.tick(&mut renderer), TickOutcome::Rendered);
    }

    #[test]
    fn test_resize_does_not_reframe() {
        let mut viewer = viewer();
        viewer.replace_scene(cube(Vec3::ZERO, 2.0));
        let camera = *viewer.camera();
        assert!(viewer.resize(Viewport::new(300, 900)));
        assert_eq!(*viewer.camera(), camera);
        assert!((viewer.viewport().aspect_ratio() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_loop_stops_on_handle() {
        let mut viewer = viewer();
        viewer.replace_scene(cube(Vec3::ZERO, 1.0));
        let render_loop = RenderLoop::new(Duration::ZERO);
        let mut renderer = CountingRenderer {
            stop_after: Some((5, render_loop.stop_handle())),
            ..Default::default()
        };
        assert_eq!(render_loop.run(&mut viewer, &mut renderer), 5);
        assert_eq!(render_loop.run_frames(&mut viewer, &mut renderer, 10), 0);
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_failed_load_keeps_current_scene() {
        let mut viewer = viewer();
        viewer.replace_scene(cube(Vec3::ZERO, 2.0));
        let camera = *viewer.camera();

        let loader = crate::loader::SceneLoader::new().unwrap();
        let source = crate::loader::SceneSource::parse("/nonexistent/dwgview/missing.gltf").unwrap();
        assert!(viewer.load(&loader, &source, None).await.is_err());

        assert_eq!(viewer.scene().map(|s| s.mesh_count()), Some(1));
        assert_eq!(*viewer.camera(), camera);
    }
}
