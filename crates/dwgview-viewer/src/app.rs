//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;

use crate::camera::CameraPlugin;
use crate::models::ModelsPlugin;
use crate::scene::ScenePlugin;
use crate::ui::UiPlugin;
use crate::upload::UploadPlugin;

/// Status line shown in the side panel
#[derive(Debug, Clone, Default, Resource)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    Info,
    Success,
    Error,
}

impl StatusMessage {
    pub fn info(&mut self, text: impl Into<String>) {
        self.set(StatusKind::Info, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.set(StatusKind::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.set(StatusKind::Error, text);
    }

    fn set(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.kind = kind;
        self.text = text.into();
    }
}

/// Run the Bevy application
pub fn run() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "dwgview".to_string(),
                        canvas: Some("#viewer-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Models are served by the daemon under /uploads
                    file_path: "".to_string(),
                    // Don't look for .meta files - server doesn't have them
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        .add_plugins(EguiPlugin::default())
        .init_resource::<StatusMessage>()
        .add_plugins(ScenePlugin)
        .add_plugins(CameraPlugin)
        .add_plugins(ModelsPlugin)
        .add_plugins(UploadPlugin)
        .add_plugins(UiPlugin)
        .run();
}
