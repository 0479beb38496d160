//! Side panel: upload, status, reset and model stats

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use crate::app::{StatusKind, StatusMessage};
use crate::camera::{ResetView, ViewerState};
use crate::models::ModelState;
use crate::upload::{OpenDwgPicker, UploadQueue, UploadState};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        // Runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(
    mut contexts: EguiContexts,
    status: Res<StatusMessage>,
    upload: Res<UploadState>,
    queue: Res<UploadQueue>,
    models: Res<ModelState>,
    viewer: Res<ViewerState>,
    mut pick: MessageWriter<OpenDwgPicker>,
    mut reset: MessageWriter<ResetView>,
) {
    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::SidePanel::left("dwgview_panel")
        .resizable(false)
        .default_width(240.0)
        .show(ctx, |ui| {
            ui.heading("dwgview");
            ui.add_space(8.0);

            if ui.button("Open DWG…").clicked() {
                pick.write(OpenDwgPicker);
            }

            if queue.is_dragging() {
                ui.label("Drop the drawing to convert it");
            }
            if let Some(file) = &upload.in_flight {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Converting {file}"));
                });
            }
            if models.loading().is_some() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading model");
                });
            }
            if !status.text.is_empty() {
                let color = match status.kind {
                    StatusKind::Info => egui::Color32::LIGHT_GRAY,
                    StatusKind::Success => egui::Color32::from_rgb(120, 200, 120),
                    StatusKind::Error => egui::Color32::from_rgb(230, 110, 110),
                };
                ui.label(egui::RichText::new(&status.text).color(color));
            }

            ui.separator();

            let can_reset = viewer.home().is_some();
            if ui
                .add_enabled(can_reset, egui::Button::new("Reset view"))
                .on_hover_text("Shortcut: R")
                .clicked()
            {
                reset.write(ResetView);
            }

            if let Some(stats) = &models.stats {
                ui.add_space(8.0);
                egui::Grid::new("model_stats").num_columns(2).show(ui, |ui| {
                    ui.label("Meshes");
                    ui.label(stats.meshes.to_string());
                    ui.end_row();
                    ui.label("Vertices");
                    ui.label(stats.vertices.to_string());
                    ui.end_row();
                    ui.label("Size");
                    ui.label(format!(
                        "{:.2} × {:.2} × {:.2}",
                        stats.size.x, stats.size.y, stats.size.z
                    ));
                    ui.end_row();
                });
                if !stats.framed {
                    ui.label("No visible geometry");
                }
                ui.small(&stats.url);
            }

            ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
                ui.small("Left drag: orbit · Right drag: pan · Wheel: zoom");
                ui.small("Drop a .dwg file anywhere to convert it");
            });
        });
}
