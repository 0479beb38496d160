//! `dwgview inspect`: load a converted model and report how it frames

use anyhow::{Context, Result};
use dwgview_core::bounds::Extent;
use dwgview_core::framing::{frame_scene, Framing, FramingOptions};
use dwgview_core::loader::{LoadProgress, SceneLoader, SceneSource};
use dwgview_core::scene::Material;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub source: String,
    pub meshes: usize,
    pub vertices: usize,
    pub materials: Vec<Material>,
    pub extent: Extent,
    /// Absent for empty or flat models
    pub framing: Option<Framing>,
}

pub async fn inspect(source: &str, normalize_to: Option<f32>) -> Result<InspectReport> {
    let parsed = SceneSource::parse(source).context("invalid model source")?;
    let loader = SceneLoader::new()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<LoadProgress>();
    let progress = tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            match p.fraction() {
                Some(f) => info!(loaded = p.loaded, percent = (f * 100.0).round(), "Loading"),
                None => info!(loaded = p.loaded, "Loading"),
            }
        }
    });

    let result = loader.load(&parsed, Some(&tx)).await;
    drop(tx);
    let _ = progress.await;
    let mut scene = result.with_context(|| format!("loading {source}"))?;

    let extent = scene.world_extent();
    let options = FramingOptions {
        normalize_to,
        ..Default::default()
    };
    let framing = frame_scene(&mut scene, &options);
    if framing.is_none() {
        warn!(source, "Model has no visible extent; camera left at default pose");
    }

    Ok(InspectReport {
        source: source.to_string(),
        meshes: scene.mesh_count(),
        vertices: scene.vertex_count(),
        materials: scene.materials(),
        extent,
        framing,
    })
}
