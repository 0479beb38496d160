//! Configuration loading

use anyhow::{Context, Result};
use dwgview_core::upload::MAX_UPLOAD_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory holding the viewer bundle, served at `/`
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_dir: default_public_dir(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("./web")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Where uploads and converted models live, served at `/uploads`
    #[serde(default = "default_uploads_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            path: default_uploads_path(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl UploadsConfig {
    pub fn max_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

fn default_uploads_path() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_size_mb() -> u64 {
    MAX_UPLOAD_BYTES / (1024 * 1024)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// LibreDWG `dwgread` executable (DWG → DXF)
    #[serde(default = "default_dwgread")]
    pub dwgread: PathBuf,
    /// Assimp CLI executable (DXF → glTF)
    #[serde(default = "default_assimp")]
    pub assimp: PathBuf,
    /// Conversions allowed to run at once; further uploads are refused
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            dwgread: default_dwgread(),
            assimp: default_assimp(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_dwgread() -> PathBuf {
    PathBuf::from("dwgread")
}

fn default_assimp() -> PathBuf {
    PathBuf::from("assimp")
}

fn default_max_concurrent() -> usize {
    1
}

/// Load configuration from file, falling back to defaults when absent
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Replace the port of a `host:port` bind address
pub fn with_port(bind: &str, port: &str) -> String {
    match bind.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{bind}:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("dwgview.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.uploads.max_bytes(), MAX_UPLOAD_BYTES);
        assert_eq!(config.converter.max_concurrent, 1);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dwgview.toml");
        std::fs::write(
            &path,
            "[uploads]\nmax_size_mb = 5\n\n[converter]\nassimp = \"/opt/assimp/bin/assimp\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.uploads.max_size_mb, 5);
        assert_eq!(config.uploads.path, PathBuf::from("./uploads"));
        assert_eq!(config.converter.assimp, PathBuf::from("/opt/assimp/bin/assimp"));
        assert_eq!(config.converter.dwgread, PathBuf::from("dwgread"));
        assert_eq!(config.server.public_dir, PathBuf::from("./web"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dwgview.toml");
        std::fs::write(&path, "[uploads\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_with_port() {
        assert_eq!(with_port("0.0.0.0:3000", "8080"), "0.0.0.0:8080");
        assert_eq!(with_port("[::]:3000", "80"), "[::]:80");
        assert_eq!(with_port("localhost", "80"), "localhost:80");
    }
}
