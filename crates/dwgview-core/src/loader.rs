//! glTF scene loading
//!
//! Parsing is split from transport: [`parse_document`] turns glTF/GLB bytes
//! into a [`Scene`] once every buffer is available, while [`SceneLoader`]
//! (behind the `fetch` feature) fetches the document and its external
//! buffers over HTTP or from disk and reports byte progress on a channel.

use base64::Engine;
use glam::{Quat, Vec3};
use thiserror::Error;
use tracing::debug;

use crate::bounds::Extent;
use crate::scene::{Geometry, Material, Node, Scene, Transform};

#[derive(Error, Debug)]
pub enum LoadError {
    #[cfg(feature = "fetch")]
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF parse error: {0}")]
    Parse(#[from] gltf::Error),
    #[error("Invalid source: {0}")]
    InvalidSource(String),
    #[error("Buffer {index} is missing or too short")]
    MissingBuffer { index: usize },
    #[error("Unsupported buffer URI: {0}")]
    UnsupportedUri(String),
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Document contains no scene")]
    NoScene,
}

/// Bytes received so far for one load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    /// Total size when the server reported one
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Fraction in `[0, 1]`, if the total is known
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.loaded as f64 / total as f64).min(1.0) as f32),
            None => None,
        }
    }
}

/// Decode a `data:` URI payload
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, LoadError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::UnsupportedUri(uri.to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::UnsupportedUri(truncate(uri)))?;
    if !header.ends_with(";base64") {
        return Err(LoadError::UnsupportedUri(truncate(uri)));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}

/// Where each buffer of a document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferSource {
    /// GLB binary chunk
    Blob,
    /// Inline `data:` URI
    Embedded(String),
    /// Relative or absolute reference to fetch
    External(String),
}

/// List buffer sources in index order
pub fn buffer_sources(document: &gltf::Document) -> Vec<BufferSource> {
    document
        .buffers()
        .map(|buffer| match buffer.source() {
            gltf::buffer::Source::Bin => BufferSource::Blob,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                BufferSource::Embedded(uri.to_string())
            }
            gltf::buffer::Source::Uri(uri) => BufferSource::External(uri.to_string()),
        })
        .collect()
}

/// Resolve every buffer that does not need I/O. External buffers are taken
/// from `fetched` in order of appearance.
pub fn resolve_buffers(
    gltf: &gltf::Gltf,
    mut fetched: impl FnMut(&str) -> Result<Vec<u8>, LoadError>,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();
    for (index, (source, buffer)) in buffer_sources(&gltf.document)
        .into_iter()
        .zip(gltf.document.buffers())
        .enumerate()
    {
        let data = match source {
            BufferSource::Blob => gltf.blob.clone().ok_or(LoadError::MissingBuffer { index })?,
            BufferSource::Embedded(uri) => decode_data_uri(&uri)?,
            BufferSource::External(uri) => fetched(&uri)?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::MissingBuffer { index });
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// Build a scene graph from a parsed document and its resolved buffers
pub fn build_scene(document: &gltf::Document, buffers: &[Vec<u8>]) -> Result<Scene, LoadError> {
    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(LoadError::NoScene)?;

    let mut root = Node {
        name: gltf_scene.name().map(str::to_string),
        ..Default::default()
    };
    for node in gltf_scene.nodes() {
        root.children.push(convert_node(&node, buffers));
    }

    let scene = Scene::new(root);
    debug!(
        meshes = scene.mesh_count(),
        vertices = scene.vertex_count(),
        "Built scene graph"
    );
    Ok(scene)
}

fn convert_node(node: &gltf::Node, buffers: &[Vec<u8>]) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut out = Node {
        name: node.name().map(str::to_string),
        transform: Transform {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        },
        ..Default::default()
    };

    if let Some(mesh) = node.mesh() {
        let mut bounds = Extent::EMPTY;
        let mut vertex_count = 0;
        let mut material = None;
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            if let Some(positions) = reader.read_positions() {
                for p in positions {
                    bounds.include_point(Vec3::from(p));
                    vertex_count += 1;
                }
            } else {
                // Fall back to accessor min/max
                let bb = primitive.bounding_box();
                bounds = bounds.union(&Extent::new(Vec3::from(bb.min), Vec3::from(bb.max)));
            }
            if material.is_none() {
                let m = primitive.material();
                material = Some(Material {
                    name: m.name().map(str::to_string),
                    base_color: m.pbr_metallic_roughness().base_color_factor(),
                });
            }
        }
        if !bounds.is_empty() {
            out.geometry = Some(Geometry {
                bounds,
                vertex_count,
            });
        }
        out.material = material;
    }

    for child in node.children() {
        out.children.push(convert_node(&child, buffers));
    }
    out
}

/// Parse a self-contained glTF (GLB or embedded buffers)
pub fn parse_document(bytes: &[u8]) -> Result<Scene, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes)?;
    let buffers = resolve_buffers(&gltf, |uri| Err(LoadError::UnsupportedUri(uri.to_string())))?;
    build_scene(&gltf.document, &buffers)
}

#[cfg(feature = "fetch")]
pub use fetch::{SceneLoader, SceneSource};

#[cfg(feature = "fetch")]
mod fetch {
    use super::*;
    use reqwest::Url;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;
    use tracing::info;

    /// Location of a scene document
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SceneSource {
        Url(Url),
        Path(PathBuf),
    }

    impl SceneSource {
        /// `http(s)://` strings are URLs, anything else is a filesystem path
        pub fn parse(s: &str) -> Result<Self, LoadError> {
            if s.starts_with("http://") || s.starts_with("https://") {
                Url::parse(s)
                    .map(SceneSource::Url)
                    .map_err(|e| LoadError::InvalidSource(format!("{s}: {e}")))
            } else if s.is_empty() {
                Err(LoadError::InvalidSource("empty source".to_string()))
            } else {
                Ok(SceneSource::Path(PathBuf::from(s)))
            }
        }

        fn join(&self, relative: &str) -> Result<SceneSource, LoadError> {
            match self {
                SceneSource::Url(base) => base
                    .join(relative)
                    .map(SceneSource::Url)
                    .map_err(|e| LoadError::InvalidSource(format!("{relative}: {e}"))),
                SceneSource::Path(path) => {
                    let dir = path.parent().unwrap_or(Path::new("."));
                    Ok(SceneSource::Path(dir.join(relative)))
                }
            }
        }
    }

    impl std::fmt::Display for SceneSource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                SceneSource::Url(url) => write!(f, "{url}"),
                SceneSource::Path(path) => write!(f, "{}", path.display()),
            }
        }
    }

    /// Fetches glTF documents and their external buffers
    #[derive(Debug, Clone)]
    pub struct SceneLoader {
        client: reqwest::Client,
    }

    impl SceneLoader {
        pub fn new() -> Result<Self, LoadError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?;
            Ok(Self { client })
        }

        /// Load a scene. Progress covers the document and every external
        /// buffer; `total` is only set when every part reported a size.
        pub async fn load(
            &self,
            source: &SceneSource,
            progress: Option<&UnboundedSender<LoadProgress>>,
        ) -> Result<Scene, LoadError> {
            info!(source = %source, "Loading scene");
            let mut tracker = ProgressTracker {
                sender: progress,
                loaded: 0,
                total: Some(0),
            };

            let bytes = self.fetch(source, &mut tracker).await?;
            let gltf = gltf::Gltf::from_slice(&bytes)?;

            let mut external = HashMap::new();
            for buffer_source in buffer_sources(&gltf.document) {
                if let BufferSource::External(uri) = buffer_source {
                    if !external.contains_key(&uri) {
                        let data = self.fetch(&source.join(&uri)?, &mut tracker).await?;
                        external.insert(uri, data);
                    }
                }
            }

            let buffers = resolve_buffers(&gltf, |uri| {
                external
                    .get(uri)
                    .cloned()
                    .ok_or_else(|| LoadError::UnsupportedUri(uri.to_string()))
            })?;
            let mut scene = build_scene(&gltf.document, &buffers)?;
            scene.source = Some(source.to_string());
            info!(
                source = %source,
                meshes = scene.mesh_count(),
                bytes = tracker.loaded,
                "Scene loaded"
            );
            Ok(scene)
        }

        async fn fetch(
            &self,
            source: &SceneSource,
            tracker: &mut ProgressTracker<'_>,
        ) -> Result<Vec<u8>, LoadError> {
            match source {
                SceneSource::Path(path) => {
                    let data = tokio::fs::read(path).await?;
                    tracker.add_total(Some(data.len() as u64));
                    tracker.advance(data.len() as u64);
                    Ok(data)
                }
                SceneSource::Url(url) => {
                    let mut response = self.client.get(url.clone()).send().await?;
                    if !response.status().is_success() {
                        return Err(LoadError::Status {
                            url: url.to_string(),
                            status: response.status().as_u16(),
                        });
                    }
                    tracker.add_total(response.content_length());
                    let mut data = Vec::new();
                    while let Some(chunk) = response.chunk().await? {
                        data.extend_from_slice(&chunk);
                        tracker.advance(chunk.len() as u64);
                    }
                    Ok(data)
                }
            }
        }
    }

    struct ProgressTracker<'a> {
        sender: Option<&'a UnboundedSender<LoadProgress>>,
        loaded: u64,
        total: Option<u64>,
    }

    impl ProgressTracker<'_> {
        fn add_total(&mut self, size: Option<u64>) {
            self.total = match (self.total, size) {
                (Some(total), Some(size)) => Some(total + size),
                _ => None,
            };
        }

        fn advance(&mut self, bytes: u64) {
            self.loaded += bytes;
            if let Some(sender) = self.sender {
                // A dropped receiver only means nobody is watching
                let _ = sender.send(LoadProgress {
                    loaded: self.loaded,
                    total: self.total,
                });
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal one-triangle document with positions `a`, `b`, `c`
    pub(crate) fn triangle_gltf(points: [[f32; 3]; 3], buffer_uri: &str) -> String {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &points {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "name": "drawing", "nodes": [0] }],
            "nodes": [{ "name": "parent", "translation": [10.0, 0.0, 0.0], "children": [1] },
                      { "name": "triangle", "mesh": 0 }],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": min, "max": max
            }],
            "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
            "buffers": [{ "byteLength": 36, "uri": buffer_uri }]
        })
        .to_string()
    }

    pub(crate) fn triangle_bytes(points: [[f32; 3]; 3]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|p| p.iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    pub(crate) fn embedded_triangle(points: [[f32; 3]; 3]) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(triangle_bytes(points));
        triangle_gltf(points, &format!("data:application/octet-stream;base64,{encoded}"))
    }

    #[test]
    fn test_parse_embedded_document() {
        let doc = embedded_triangle([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 4.0, -1.0]]);
        let scene = parse_document(doc.as_bytes()).unwrap();

        assert_eq!(scene.mesh_count(), 1);
        assert_eq!(scene.vertex_count(), 3);
        let extent = scene.world_extent();
        assert_eq!(extent.min, Vec3::new(10.0, 0.0, -1.0));
        assert_eq!(extent.max, Vec3::new(12.0, 4.0, 0.0));
        assert_eq!(scene.root.name.as_deref(), Some("drawing"));
    }

    #[test]
    fn test_external_buffer_needs_fetch() {
        let doc = triangle_gltf([[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], "model.bin");
        assert!(matches!(
            parse_document(doc.as_bytes()),
            Err(LoadError::UnsupportedUri(uri)) if uri == "model.bin"
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(parse_document(b"{ not gltf"), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(decode_data_uri("data:application/octet-stream;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("model.bin").is_err());
    }

    #[test]
    fn test_progress_fraction() {
        let p = LoadProgress { loaded: 50, total: Some(200) };
        assert_eq!(p.fraction(), Some(0.25));
        assert_eq!(LoadProgress { loaded: 5, total: None }.fraction(), None);
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_load_from_path_with_external_buffer() {
        let dir = tempfile::TempDir::new().unwrap();
        let points = [[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0], [0.0, 3.0, 0.0]];
        std::fs::write(dir.path().join("model.bin"), triangle_bytes(points)).unwrap();
        let gltf_path = dir.path().join("model.gltf");
        std::fs::write(&gltf_path, triangle_gltf(points, "model.bin")).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let loader = SceneLoader::new().unwrap();
        let source = SceneSource::parse(gltf_path.to_str().unwrap()).unwrap();
        let scene = loader.load(&source, Some(&tx)).await.unwrap();
        drop(tx);

        assert_eq!(scene.vertex_count(), 3);
        assert_eq!(scene.world_extent().max, Vec3::new(11.0, 3.0, 1.0));

        let mut last = None;
        while let Some(p) = rx.recv().await {
            last = Some(p);
        }
        let last = last.expect("progress reported");
        assert_eq!(last.fraction(), Some(1.0));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_missing_file_is_load_error() {
        let loader = SceneLoader::new().unwrap();
        let source = SceneSource::parse("/nonexistent/dwgview/model.gltf").unwrap();
        assert!(matches!(loader.load(&source, None).await, Err(LoadError::Io(_))));
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_source_parse() {
        assert!(matches!(SceneSource::parse("https://x.test/a.gltf"), Ok(SceneSource::Url(_))));
        assert!(matches!(SceneSource::parse("uploads/a.gltf"), Ok(SceneSource::Path(_))));
        assert!(SceneSource::parse("").is_err());
    }
}
