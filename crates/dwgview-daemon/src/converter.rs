//! DWG → glTF conversion through external tools
//!
//! Two stages: LibreDWG `dwgread` writes an intermediate DXF, then the Assimp
//! CLI exports it as glTF. The DXF is removed whatever the outcome.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConverterConfig;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{tool} not found. Install with: sudo apt install {package}")]
    ToolMissing { tool: String, package: &'static str },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{stage} finished but produced no output at {}", .path.display())]
    MissingOutput { stage: &'static str, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One external program in the pipeline
#[derive(Debug, Clone)]
struct Tool {
    program: PathBuf,
    package: &'static str,
    stage: &'static str,
}

impl Tool {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    async fn run<I, S>(&self, args: I, expected: &Path) -> Result<(), ConvertError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ConvertError::ToolMissing {
                        tool: self.name(),
                        package: self.package,
                    }
                }
                _ => ConvertError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ConvertError::ToolFailed {
                tool: self.name(),
                status: output.status.to_string(),
                stderr,
            });
        }
        if !tokio::fs::try_exists(expected).await.unwrap_or(false) {
            return Err(ConvertError::MissingOutput {
                stage: self.stage,
                path: expected.to_path_buf(),
            });
        }
        debug!(tool = %self.name(), output = %expected.display(), "Stage complete");
        Ok(())
    }

    fn is_available(&self) -> bool {
        find_executable(&self.program).is_some()
    }
}

/// Runs the dwgread → assimp pipeline
#[derive(Debug, Clone)]
pub struct Converter {
    dwgread: Tool,
    assimp: Tool,
}

impl Converter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            dwgread: Tool {
                program: config.dwgread.clone(),
                package: "libredwg-utils",
                stage: "DWG to DXF",
            },
            assimp: Tool {
                program: config.assimp.clone(),
                package: "assimp-utils",
                stage: "DXF to glTF",
            },
        }
    }

    /// Default output for `input`: same directory and stem, `.gltf`
    pub fn output_path_for(input: &Path) -> PathBuf {
        input.with_extension("gltf")
    }

    /// Install hints for every tool not found on `PATH`
    pub fn missing_tools(&self) -> Vec<String> {
        [&self.dwgread, &self.assimp]
            .into_iter()
            .filter(|tool| !tool.is_available())
            .map(|tool| format!("{} (sudo apt install {})", tool.name(), tool.package))
            .collect()
    }

    /// Convert `input` to glTF at `output`
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConvertError> {
        info!(input = %input.display(), output = %output.display(), "Converting DWG to glTF");
        let dxf = intermediate_path(output);

        let result = self.run_stages(input, &dxf, output).await;

        match tokio::fs::remove_file(&dxf).await {
            Ok(()) => debug!(path = %dxf.display(), "Removed intermediate DXF"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %dxf.display(), error = %e, "Failed to remove intermediate DXF"),
        }

        match &result {
            Ok(()) => info!(output = %output.display(), "Conversion successful"),
            Err(e) => warn!(input = %input.display(), error = %e, "Conversion failed"),
        }
        result.map(|()| output.to_path_buf())
    }

    async fn run_stages(&self, input: &Path, dxf: &Path, output: &Path) -> Result<(), ConvertError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.dwgread
            .run([input.as_os_str(), OsStr::new("-o"), dxf.as_os_str()], dxf)
            .await?;
        self.assimp
            .run([OsStr::new("export"), dxf.as_os_str(), output.as_os_str()], output)
            .await
    }
}

fn intermediate_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "drawing".to_string());
    let id = uuid::Uuid::new_v4().simple().to_string();
    output.with_file_name(format!("{stem}.{}.dxf", &id[..8]))
}

/// Resolve a program the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
