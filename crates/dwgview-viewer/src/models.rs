//! glTF model loading and replacement
//!
//! A new model is spawned hidden and only swapped in once its scene
//! instance is ready and its bounds are known; the previous model stays on
//! screen until then, and stays for good if the new one fails to load.

use bevy::asset::{LoadState, RecursiveDependencyLoadState};
use bevy::gltf::Gltf;
use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;
use tracing::{debug, info, warn};
use bevy::scene::{SceneInstance, SceneSpawner};
use dwgview_core::{Extent, Node, Scene};

use crate::app::StatusMessage;
use crate::camera::ViewerState;

/// Request to load the model at `url`, replacing the current one
#[derive(Message, Debug, Clone)]
pub struct LoadModel {
    pub url: String,
}

/// Summary of the model on screen
#[derive(Debug, Clone)]
pub struct ModelStats {
    pub url: String,
    pub meshes: usize,
    pub vertices: usize,
    /// Size before framing
    pub size: Vec3,
    /// False when the model had no extent and the camera was left alone
    pub framed: bool,
}

struct PendingModel {
    url: String,
    handle: Handle<Gltf>,
    root: Option<Entity>,
}

#[derive(Resource, Default)]
pub struct ModelState {
    current: Option<Entity>,
    pending: Option<PendingModel>,
    pub stats: Option<ModelStats>,
}

impl ModelState {
    /// URL of the model still loading, if any
    pub fn loading(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.url.as_str())
    }
}

#[derive(Component)]
struct ModelRoot;

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelState>()
            .add_message::<LoadModel>()
            .add_systems(
                Update,
                (start_model_load, spawn_loaded_model, swap_in_ready_model).chain(),
            );
    }
}

fn start_model_load(
    mut commands: Commands,
    mut requests: MessageReader<LoadModel>,
    asset_server: Res<AssetServer>,
    mut state: ResMut<ModelState>,
    mut status: ResMut<StatusMessage>,
) {
    // Latest request wins
    let Some(request) = requests.read().last() else {
        return;
    };
    if let Some(abandoned) = state.pending.take() {
        debug!(url = %abandoned.url, "Abandoning unfinished model load");
        if let Some(root) = abandoned.root {
            commands.entity(root).despawn();
        }
    }

    info!(url = %request.url, "Loading model");
    status.info("Loading model...");
    state.pending = Some(PendingModel {
        url: request.url.clone(),
        handle: asset_server.load::<Gltf>(request.url.clone()),
        root: None,
    });
}

fn spawn_loaded_model(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    mut state: ResMut<ModelState>,
    mut status: ResMut<StatusMessage>,
) {
    let Some(pending) = state.pending.as_ref() else {
        return;
    };
    if pending.root.is_some() {
        return;
    }
    let id = pending.handle.id();

    let failed = matches!(asset_server.get_load_state(id), Some(LoadState::Failed(_)))
        || matches!(
            asset_server.get_recursive_dependency_load_state(id),
            Some(RecursiveDependencyLoadState::Failed(_))
        );
    if failed {
        warn!(url = %pending.url, "Model failed to load");
        status.error(format!("Failed to load model {}", pending.url));
        state.pending = None;
        return;
    }
    if !asset_server.is_loaded_with_dependencies(id) {
        return;
    }
    let Some(gltf) = gltfs.get(id) else {
        return;
    };
    let Some(scene) = gltf
        .default_scene
        .clone()
        .or_else(|| gltf.scenes.first().cloned())
    else {
        warn!(url = %pending.url, "Model contains no scene");
        status.error("The converted model contains no scene");
        state.pending = None;
        return;
    };

    let root = commands
        .spawn((
            Name::new(pending.url.clone()),
            SceneRoot(scene),
            Transform::default(),
            Visibility::Hidden,
            ModelRoot,
        ))
        .id();
    if let Some(pending) = state.pending.as_mut() {
        pending.root = Some(root);
    }
}

#[allow(clippy::too_many_arguments)]
fn swap_in_ready_model(
    mut commands: Commands,
    scene_spawner: Res<SceneSpawner>,
    instances: Query<&SceneInstance>,
    children: Query<&Children>,
    nodes: Query<(&Transform, Option<&Mesh3d>), Without<ModelRoot>>,
    meshes: Res<Assets<Mesh>>,
    mut roots: Query<(&mut Transform, &mut Visibility), With<ModelRoot>>,
    mut viewer: ResMut<ViewerState>,
    mut state: ResMut<ModelState>,
    mut status: ResMut<StatusMessage>,
) {
    let Some(root) = state.pending.as_ref().and_then(|p| p.root) else {
        return;
    };
    let Ok(instance) = instances.get(root) else {
        return;
    };
    if !scene_spawner.instance_is_ready(**instance) {
        return;
    }
    let Some(pending) = state.pending.take() else {
        return;
    };

    let measured = measure(root, &children, &nodes, &meshes);
    let scene_root = if measured.extent.is_empty() {
        Node::named("model")
    } else {
        Node::with_box("model", measured.extent.center(), measured.extent.size())
    };
    let framing = viewer.replace_scene(Scene {
        source: Some(pending.url.clone()),
        root: scene_root,
    });

    if let Ok((mut transform, mut visibility)) = roots.get_mut(root) {
        *transform = match framing {
            Some(f) => Transform::from_translation(f.centering * f.scale).with_scale(Vec3::splat(f.scale)),
            None => Transform::default(),
        };
        *visibility = Visibility::Inherited;
    }
    if let Some(old) = state.current.replace(root) {
        commands.entity(old).despawn();
    }

    if framing.is_some() {
        status.success("Model loaded");
    } else {
        warn!(url = %pending.url, "Model has no extent; camera left unchanged");
        status.info("Model loaded, but it has no visible geometry");
    }
    info!(
        url = %pending.url,
        meshes = measured.meshes,
        vertices = measured.vertices,
        "Model swapped in"
    );
    state.stats = Some(ModelStats {
        url: pending.url,
        meshes: measured.meshes,
        vertices: measured.vertices,
        size: measured.extent.size(),
        framed: framing.is_some(),
    });
}

struct Measured {
    extent: Extent,
    meshes: usize,
    vertices: usize,
}

/// Bounds of every mesh under `root`, in the root's local space
fn measure(
    root: Entity,
    children: &Query<&Children>,
    nodes: &Query<(&Transform, Option<&Mesh3d>), Without<ModelRoot>>,
    meshes: &Assets<Mesh>,
) -> Measured {
    let mut measured = Measured {
        extent: Extent::EMPTY,
        meshes: 0,
        vertices: 0,
    };
    // Walked by hand: global transforms of a freshly spawned scene are not
    // propagated yet
    let mut stack = vec![(root, Mat4::IDENTITY)];
    while let Some((entity, parent)) = stack.pop() {
        let Ok(kids) = children.get(entity) else {
            continue;
        };
        for &child in &**kids {
            let Ok((transform, mesh)) = nodes.get(child) else {
                continue;
            };
            let world = parent
                * Mat4::from_scale_rotation_translation(
                    transform.scale,
                    transform.rotation,
                    transform.translation,
                );
            if let Some(mesh) = mesh.and_then(|m| meshes.get(&m.0)) {
                if let Some(VertexAttributeValues::Float32x3(positions)) =
                    mesh.attribute(Mesh::ATTRIBUTE_POSITION)
                {
                    for p in positions {
                        measured
                            .extent
                            .include_point(world.transform_point3(Vec3::from_array(*p)));
                    }
                    measured.meshes += 1;
                    measured.vertices += positions.len();
                }
            }
            stack.push((child, world));
        }
    }
    measured
}
