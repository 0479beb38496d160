//! Core model for dwgview
//!
//! Scene graph and bounds, framing of a loaded model in front of a
//! perspective camera, orbit navigation, the animated reset to the home
//! pose, glTF loading, and the upload rules shared with the conversion
//! server.

pub mod bounds;
pub mod camera;
pub mod controls;
pub mod framing;
pub mod loader;
pub mod reset;
pub mod scene;
pub mod upload;
pub mod viewer;

pub use bounds::Extent;
pub use camera::{CameraPose, ControlBounds, HomePose, Viewport};
pub use controls::{InputDelta, OrbitControls};
pub use framing::{compute_framing, frame_scene, Framing, FramingOptions};
pub use loader::{LoadError, LoadProgress};
pub use reset::{ResetController, ResetStatus};
pub use scene::{Node, Scene, Transform};
pub use upload::{ConvertResponse, UploadRejection};
pub use viewer::{RenderLoop, Renderer, StopHandle, TickOutcome, Viewer};
