//! Application state shared by the request handlers

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::converter::Converter;

pub struct AppState {
    pub config: Config,
    pub converter: Converter,
    /// One permit per conversion allowed to run at once
    pub conversions: Semaphore,
    /// Upload and model directory, created at startup
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let uploads_dir = config.uploads.path.clone();
        std::fs::create_dir_all(&uploads_dir)
            .with_context(|| format!("creating upload directory {}", uploads_dir.display()))?;

        let converter = Converter::new(&config.converter);
        for missing in converter.missing_tools() {
            warn!(tool = %missing, "Converter tool not found on PATH");
        }

        let permits = config.converter.max_concurrent.max(1);
        info!(
            uploads = %uploads_dir.display(),
            max_concurrent = permits,
            "Application state ready"
        );

        Ok(Arc::new(Self {
            conversions: Semaphore::new(permits),
            converter,
            uploads_dir,
            config,
        }))
    }
}
