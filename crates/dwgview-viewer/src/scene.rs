//! Camera entity and lighting

use bevy::prelude::*;
use dwgview_core::CameraPose;

use crate::camera::{camera_transform, perspective, MainCamera};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene);
    }
}

fn setup_scene(mut commands: Commands) {
    // Default pose until a model has been framed
    let pose = CameraPose::default();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(perspective(&pose, 1.0)),
        camera_transform(&pose),
        AmbientLight {
            color: Color::srgb(0.9, 0.95, 1.0),
            brightness: 400.0,
            ..default()
        },
        MainCamera,
    ));

    // Light travels with the camera
    commands.spawn((
        DirectionalLight {
            illuminance: 6000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(1.0, 2.0, 1.5).looking_at(Vec3::ZERO, Vec3::Y),
        CameraLight,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 1500.0,
            shadows_enabled: false,
            color: Color::srgb(1.0, 0.95, 0.9),
            ..default()
        },
        Transform::from_xyz(-1.0, -0.5, -1.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Key light kept aligned with the view direction
#[derive(Component)]
pub struct CameraLight;
